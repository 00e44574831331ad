use crate::config::BingoConfig;
use crate::error::{BingoError, Result};
use crate::types::{Address, GameId, ProposalId, Wei};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalStatus {
    Open,
    Active,
    Cancelled,
}

/// Parameters a creator chooses when proposing a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalParams {
    pub wei_buy_in: Wei,
    pub draw_interval_sec: u64,
    pub num_players_required: u32,
    /// Per-player card cap for this proposal, bounded by the house cap.
    pub max_cards_per_player: u32,
    /// Cards the creator buys on creation.
    pub cards: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub player: Address,
    pub cards_requested: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameProposal {
    pub id: ProposalId,
    pub creator: Address,
    pub wei_buy_in: Wei,
    pub draw_interval_sec: u64,
    pub num_players_required: u32,
    pub max_cards_per_player: u32,
    pub status: ProposalStatus,
    /// Enrollment order drives board minting order.
    pub enrollments: Vec<Enrollment>,
    pub escrow: Wei,
    pub created_at: i64,
    pub game_id: Option<GameId>,
    /// Stakes owed back after cancellation.
    #[serde(default)]
    pub refunds: BTreeMap<Address, Wei>,
}

impl GameProposal {
    pub fn cards_of(&self, player: &Address) -> u32 {
        self.enrollments
            .iter()
            .find(|e| &e.player == player)
            .map_or(0, |e| e.cards_requested)
    }

    pub fn player_count(&self) -> usize {
        self.enrollments.len()
    }

    pub fn total_cards(&self) -> u64 {
        self.enrollments.iter().map(|e| e.cards_requested as u64).sum()
    }

    /// escrow == sum(cards_requested * wei_buy_in)
    pub fn escrow_matches_stakes(&self) -> bool {
        let expected = self.enrollments.iter().try_fold(0 as Wei, |acc, e| {
            self.wei_buy_in
                .checked_mul(e.cards_requested as Wei)
                .and_then(|stake| acc.checked_add(stake))
        });
        expected == Some(self.escrow)
    }

    fn stake_for(&self, cards: u32) -> Result<Wei> {
        stake_of(self.wei_buy_in, cards)
    }

    /// Credits `stake` to `player`. The caller has already checked that
    /// `stake` fits in the escrow.
    fn enroll(&mut self, player: Address, cards: u32, stake: Wei) {
        match self.enrollments.iter_mut().find(|e| e.player == player) {
            Some(existing) => existing.cards_requested += cards,
            None => self.enrollments.push(Enrollment {
                player,
                cards_requested: cards,
            }),
        }
        self.escrow += stake;
    }
}

fn stake_of(buy_in: Wei, cards: u32) -> Result<Wei> {
    buy_in
        .checked_mul(cards as Wei)
        .ok_or(BingoError::AmountOverflow { buy_in, cards })
}

/// Result of a successful enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinReceipt {
    pub stake: Wei,
    /// Paid value above the stake, returned to the caller.
    pub change: Wei,
    pub quorum_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRegistry {
    proposals: BTreeMap<ProposalId, GameProposal>,
    next_proposal_id: ProposalId,
}

impl Default for ProposalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalRegistry {
    pub fn new() -> Self {
        Self {
            proposals: BTreeMap::new(),
            next_proposal_id: 1,
        }
    }

    pub fn create(
        &mut self,
        config: &BingoConfig,
        creator: Address,
        params: ProposalParams,
        paid_value: Wei,
        now: i64,
    ) -> Result<(ProposalId, JoinReceipt)> {
        if params.wei_buy_in < config.min_wei_buy_in {
            return Err(BingoError::InvalidBuyIn {
                buy_in: params.wei_buy_in,
                min: config.min_wei_buy_in,
            });
        }

        if params.draw_interval_sec > config.max_draw_interval_sec {
            return Err(BingoError::IntervalTooLong {
                interval: params.draw_interval_sec,
                max: config.max_draw_interval_sec,
            });
        }

        if params.num_players_required < config.min_num_players {
            return Err(BingoError::TooFewPlayers {
                requested: params.num_players_required,
                min: config.min_num_players,
            });
        }

        if params.max_cards_per_player > config.max_cards_per_player {
            return Err(BingoError::TooManyCards {
                requested: params.max_cards_per_player,
                max: config.max_cards_per_player,
            });
        }

        if params.cards > params.max_cards_per_player {
            return Err(BingoError::TooManyCards {
                requested: params.cards,
                max: params.max_cards_per_player,
            });
        }

        if params.cards == 0 {
            return Err(BingoError::ZeroCards);
        }

        let stake = stake_of(params.wei_buy_in, params.cards)?;
        if paid_value < stake {
            return Err(BingoError::InsufficientPayment {
                need: stake,
                paid: paid_value,
            });
        }

        let id = self.next_proposal_id;
        let mut proposal = GameProposal {
            id,
            creator,
            wei_buy_in: params.wei_buy_in,
            draw_interval_sec: params.draw_interval_sec,
            num_players_required: params.num_players_required,
            max_cards_per_player: params.max_cards_per_player,
            status: ProposalStatus::Open,
            enrollments: Vec::new(),
            escrow: 0,
            created_at: now,
            game_id: None,
            refunds: BTreeMap::new(),
        };
        proposal.enroll(creator, params.cards, stake);
        let quorum_reached = proposal.player_count() >= proposal.num_players_required as usize;

        self.proposals.insert(id, proposal);
        self.next_proposal_id += 1;

        Ok((
            id,
            JoinReceipt {
                stake,
                change: paid_value - stake,
                quorum_reached,
            },
        ))
    }

    pub fn join(
        &mut self,
        proposal_id: ProposalId,
        player: Address,
        cards: u32,
        paid_value: Wei,
    ) -> Result<JoinReceipt> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(BingoError::UnknownProposal(proposal_id))?;

        if proposal.status != ProposalStatus::Open {
            return Err(BingoError::ProposalNotActive(proposal_id));
        }

        if cards == 0 {
            return Err(BingoError::ZeroCards);
        }

        let cumulative = proposal.cards_of(&player).saturating_add(cards);
        if cumulative > proposal.max_cards_per_player {
            return Err(BingoError::TooManyCards {
                requested: cumulative,
                max: proposal.max_cards_per_player,
            });
        }

        let stake = proposal.stake_for(cards)?;
        if paid_value < stake {
            return Err(BingoError::InsufficientPayment {
                need: stake,
                paid: paid_value,
            });
        }

        if proposal.escrow.checked_add(stake).is_none() {
            return Err(BingoError::AmountOverflow {
                buy_in: proposal.wei_buy_in,
                cards,
            });
        }

        proposal.enroll(player, cards, stake);
        let quorum_reached = proposal.player_count() >= proposal.num_players_required as usize;

        Ok(JoinReceipt {
            stake,
            change: paid_value - stake,
            quorum_reached,
        })
    }

    /// Flips an Open proposal to Active and moves its escrow out.
    pub fn mark_active(&mut self, proposal_id: ProposalId, game_id: GameId) -> Result<Wei> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(BingoError::UnknownProposal(proposal_id))?;

        if proposal.status != ProposalStatus::Open {
            return Err(BingoError::ProposalNotActive(proposal_id));
        }

        proposal.status = ProposalStatus::Active;
        proposal.game_id = Some(game_id);
        Ok(std::mem::take(&mut proposal.escrow))
    }

    pub fn cancel(&mut self, proposal_id: ProposalId, caller: &Address) -> Result<Wei> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(BingoError::UnknownProposal(proposal_id))?;

        if &proposal.creator != caller {
            return Err(BingoError::NotProposalCreator(proposal_id));
        }

        if proposal.status != ProposalStatus::Open {
            return Err(BingoError::ProposalNotActive(proposal_id));
        }

        let refunds: BTreeMap<Address, Wei> = proposal
            .enrollments
            .iter()
            .map(|e| (e.player, proposal.wei_buy_in * e.cards_requested as Wei))
            .collect();
        let released = proposal.escrow;

        proposal.refunds = refunds;
        proposal.escrow = 0;
        proposal.status = ProposalStatus::Cancelled;
        Ok(released)
    }

    /// Removes and returns the refund owed to `player`.
    pub fn take_refund(&mut self, proposal_id: ProposalId, player: &Address) -> Result<Wei> {
        let proposal = self
            .proposals
            .get_mut(&proposal_id)
            .ok_or(BingoError::UnknownProposal(proposal_id))?;

        match proposal.refunds.remove(player) {
            Some(amount) if amount > 0 => Ok(amount),
            _ => Err(BingoError::NothingToRefund(*player)),
        }
    }

    pub fn get(&self, proposal_id: ProposalId) -> Option<&GameProposal> {
        self.proposals.get(&proposal_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameProposal> {
        self.proposals.values()
    }

    pub fn next_proposal_id(&self) -> ProposalId {
        self.next_proposal_id
    }

    pub(crate) fn restore(proposals: Vec<GameProposal>, next_proposal_id: ProposalId) -> Self {
        Self {
            proposals: proposals.into_iter().map(|p| (p.id, p)).collect(),
            next_proposal_id,
        }
    }
}
