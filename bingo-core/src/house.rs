//! The coordinating service. Every public operation runs as one serialized
//! transaction over a working copy of the ledger: validate, mutate, commit,
//! then at most one outbound transfer. A rejected operation leaves no trace.

use crate::activator::GameActivator;
use crate::badge::WinnerBadge;
use crate::board::BoardToken;
use crate::config::BingoConfig;
use crate::error::{BingoError, Result};
use crate::events::{EventKind, LedgerEvent};
use crate::game::Game;
use crate::host::{Clock, EntropySource, FundsTransport, InMemoryTransport, OsEntropy, SystemClock};
use crate::ledger::LedgerState;
use crate::pattern::WinLine;
use crate::payout::EscrowPool;
use crate::proposal::{GameProposal, ProposalParams};
use crate::types::{Address, GameId, ProposalId, TokenId, Wei};
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of creating or joining a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    pub proposal_id: ProposalId,
    /// Overpayment returned to the caller.
    pub change: Wei,
    /// Set when this enrollment filled the proposal.
    pub game_id: Option<GameId>,
}

#[derive(Debug, Clone, Copy)]
struct Transfer {
    to: Address,
    amount: Wei,
}

struct TxContext<'a> {
    now: i64,
    entropy: [u8; 32],
    config: &'a BingoConfig,
    transfer: Option<Transfer>,
}

impl TxContext<'_> {
    fn pay(&mut self, to: Address, amount: Wei) -> Result<()> {
        if self.transfer.is_some() {
            return Err(BingoError::internal("only one transfer per operation"));
        }
        if amount > 0 {
            self.transfer = Some(Transfer { to, amount });
        }
        Ok(())
    }
}

pub struct BingoHouse {
    config: BingoConfig,
    state: Mutex<LedgerState>,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn EntropySource>,
    transport: Arc<dyn FundsTransport>,
}

impl BingoHouse {
    pub fn new(config: BingoConfig) -> Result<Self> {
        Self::with_state(config, LedgerState::new())
    }

    /// Resumes from a previously persisted ledger.
    pub fn with_state(config: BingoConfig, state: LedgerState) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: Mutex::new(state),
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            transport: Arc::new(InMemoryTransport::new()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn FundsTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn config(&self) -> &BingoConfig {
        &self.config
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Runs `f` on a working copy, commits it, then makes the queued
    /// transfer. A failed transfer restores the previous state only while no
    /// other operation has committed since; once one has (a transport that
    /// calls back into the house), the effects stay and `Transfer` is still
    /// returned, leaving the transfer to be retried by the caller.
    fn transact<T>(
        &self,
        op: &str,
        f: impl FnOnce(&mut LedgerState, &mut TxContext<'_>) -> Result<T>,
    ) -> Result<T> {
        let (value, transfer, committed_revision, previous) = {
            let mut state = self.state.lock();
            let mut working = state.clone();
            let mut ctx = TxContext {
                now: self.clock.now(),
                entropy: self.entropy.entropy(),
                config: &self.config,
                transfer: None,
            };

            let value = f(&mut working, &mut ctx).map_err(|e| {
                tracing::debug!("{} rejected: {}", op, e);
                e
            })?;

            working.revision += 1;
            let committed_revision = working.revision;
            let previous = std::mem::replace(&mut *state, working);
            (value, ctx.transfer, committed_revision, previous)
        };

        // Bookkeeping is committed and the lock released before funds move,
        // so a transport that calls back in sees the post-payment state.
        if let Some(Transfer { to, amount }) = transfer {
            if let Err(e) = self.transport.send(&to, amount) {
                let mut state = self.state.lock();
                if state.revision == committed_revision {
                    *state = previous;
                    tracing::warn!(
                        "{} rolled back: transfer of {} wei to {} failed: {}",
                        op,
                        amount,
                        to,
                        e
                    );
                } else {
                    tracing::error!(
                        "{} kept: transfer of {} wei to {} failed after later commits: {}",
                        op,
                        amount,
                        to,
                        e
                    );
                }
                return Err(BingoError::Transfer {
                    to,
                    amount,
                    reason: e.to_string(),
                });
            }
        }

        Ok(value)
    }

    /// Opens a proposal and enrolls the creator with `params.cards` cards.
    pub fn create_proposal(
        &self,
        caller: Address,
        params: ProposalParams,
        paid_value: Wei,
    ) -> Result<JoinOutcome> {
        self.transact("create_proposal", |state, ctx| {
            let (proposal_id, receipt) =
                state
                    .proposals
                    .create(ctx.config, caller, params, paid_value, ctx.now)?;

            state.record(
                ctx.now,
                EventKind::ProposalCreated {
                    proposal_id,
                    creator: caller,
                    wei_buy_in: params.wei_buy_in,
                    num_players_required: params.num_players_required,
                },
            );
            state.record(
                ctx.now,
                EventKind::PlayerJoined {
                    proposal_id,
                    player: caller,
                    cards: params.cards,
                    escrow: receipt.stake,
                },
            );

            tracing::info!(
                "Proposal {} created by {}: buy-in {} wei, {} players required",
                proposal_id,
                caller,
                params.wei_buy_in,
                params.num_players_required
            );

            let game_id = if receipt.quorum_reached {
                Some(activate(state, ctx, proposal_id)?)
            } else {
                None
            };

            ctx.pay(caller, receipt.change)?;
            Ok(JoinOutcome {
                proposal_id,
                change: receipt.change,
                game_id,
            })
        })
    }

    /// Enrolls `caller` in an open proposal. Filling the last seat activates
    /// the game in the same transaction.
    pub fn join_proposal(
        &self,
        caller: Address,
        proposal_id: ProposalId,
        cards: u32,
        paid_value: Wei,
    ) -> Result<JoinOutcome> {
        self.transact("join_proposal", |state, ctx| {
            let receipt = state.proposals.join(proposal_id, caller, cards, paid_value)?;
            let escrow = state.proposals.get(proposal_id).map_or(0, |p| p.escrow);

            state.record(
                ctx.now,
                EventKind::PlayerJoined {
                    proposal_id,
                    player: caller,
                    cards,
                    escrow,
                },
            );
            tracing::info!(
                "Player {} joined proposal {} with {} card(s)",
                caller,
                proposal_id,
                cards
            );

            let game_id = if receipt.quorum_reached {
                Some(activate(state, ctx, proposal_id)?)
            } else {
                None
            };

            ctx.pay(caller, receipt.change)?;
            Ok(JoinOutcome {
                proposal_id,
                change: receipt.change,
                game_id,
            })
        })
    }

    /// Cancels an open proposal; every enrolled stake becomes withdrawable.
    pub fn cancel_proposal(&self, caller: Address, proposal_id: ProposalId) -> Result<()> {
        self.transact("cancel_proposal", |state, ctx| {
            let released = state.proposals.cancel(proposal_id, &caller)?;
            state.record(ctx.now, EventKind::ProposalCancelled { proposal_id });
            tracing::info!(
                "Proposal {} cancelled by {}, {} wei released for refunds",
                proposal_id,
                caller,
                released
            );
            Ok(())
        })
    }

    pub fn withdraw_refund(&self, caller: Address, proposal_id: ProposalId) -> Result<Wei> {
        self.transact("withdraw_refund", |state, ctx| {
            let amount = state.proposals.take_refund(proposal_id, &caller)?;
            state.record(
                ctx.now,
                EventKind::RefundWithdrawn {
                    proposal_id,
                    player: caller,
                    amount,
                },
            );
            tracing::info!("Refunded {} wei to {} from proposal {}", amount, caller, proposal_id);
            ctx.pay(caller, amount)?;
            Ok(amount)
        })
    }

    pub fn draw_number(&self, game_id: GameId) -> Result<u8> {
        self.transact("draw_number", |state, ctx| {
            let outcome = state.games.get_mut(game_id)?.draw_number(
                &ctx.entropy,
                ctx.now,
                ctx.config.claim_grace_sec,
            )?;

            state.record(
                ctx.now,
                EventKind::NumberDrawn {
                    game_id,
                    number: outcome.number,
                    draw_index: outcome.draw_index,
                },
            );
            tracing::debug!(
                "Game {} draw #{}: {}",
                game_id,
                outcome.draw_index + 1,
                outcome.number
            );

            if let Some(closes_at) = outcome.claim_window_closes_at {
                state.record(ctx.now, EventKind::ClaimWindowOpened { game_id, closes_at });
                tracing::info!(
                    "Game {} drew every number; claim window closes at {}",
                    game_id,
                    closes_at
                );
            }

            Ok(outcome.number)
        })
    }

    pub fn claim_bingo(&self, caller: Address, game_id: GameId, token_id: TokenId) -> Result<WinLine> {
        self.transact("claim_bingo", |state, ctx| {
            let game = state.games.get_mut(game_id)?;
            let board = state
                .boards
                .get_mut(token_id)
                .ok_or(BingoError::UnknownToken(token_id))?;

            let line = game.claim_bingo(board, &caller, ctx.config.claim_policy, ctx.now)?;

            state.record(
                ctx.now,
                EventKind::BingoClaimed {
                    game_id,
                    token_id,
                    winner: caller,
                    line,
                },
            );
            tracing::info!(
                "Bingo! {} won game {} with board {} ({:?})",
                caller,
                game_id,
                token_id,
                line
            );
            Ok(line)
        })
    }

    /// Pays the caller's equal share of the game's escrow and mints their
    /// winner badge. The share is marked paid before the transfer is made.
    pub fn get_winnings(&self, caller: Address, game_id: GameId) -> Result<Wei> {
        self.transact("get_winnings", |state, ctx| {
            let game = state.games.get_mut(game_id)?;
            let settlement = state.payouts.settle(game, &caller, ctx.now)?;
            let minted = state.badges.mint(caller, game_id, ctx.now);

            state.record(
                ctx.now,
                EventKind::WinningsPaid {
                    game_id,
                    winner: caller,
                    amount: settlement.amount,
                },
            );
            if minted {
                state.record(ctx.now, EventKind::BadgeMinted { holder: caller });
            }
            if settlement.game_closed {
                state.record(ctx.now, EventKind::GameClosed { game_id });
                tracing::info!("Game {} closed: every winner paid", game_id);
            }

            tracing::info!(
                "Paid {} wei to {} from game {}",
                settlement.amount,
                caller,
                game_id
            );
            ctx.pay(caller, settlement.amount)?;
            Ok(settlement.amount)
        })
    }

    pub fn proposal(&self, proposal_id: ProposalId) -> Option<GameProposal> {
        self.state.lock().proposals.get(proposal_id).cloned()
    }

    pub fn proposals(&self) -> Vec<GameProposal> {
        self.state.lock().proposals.iter().cloned().collect()
    }

    pub fn game(&self, game_id: GameId) -> Option<Game> {
        self.state.lock().games.get(game_id).cloned()
    }

    pub fn games(&self) -> Vec<Game> {
        self.state.lock().games.iter().cloned().collect()
    }

    pub fn board(&self, token_id: TokenId) -> Option<BoardToken> {
        self.state.lock().boards.get(token_id).cloned()
    }

    pub fn boards_of(&self, owner: &Address, game_id: GameId) -> Vec<BoardToken> {
        self.state
            .lock()
            .boards
            .tokens_of(owner, game_id)
            .cloned()
            .collect()
    }

    pub fn escrow_pool(&self, game_id: GameId) -> Option<EscrowPool> {
        self.state.lock().payouts.pool(game_id).cloned()
    }

    pub fn is_badge_holder(&self, address: &Address) -> bool {
        self.state.lock().badges.is_holder(address)
    }

    pub fn badge_holders(&self) -> Vec<WinnerBadge> {
        self.state.lock().badges.iter().cloned().collect()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().events.clone()
    }

    pub fn snapshot(&self) -> LedgerState {
        self.state.lock().clone()
    }
}

/// Converts a filled proposal into a game. Runs inside the enrolling
/// transaction, so any failure also undoes the enrollment and status flip.
fn activate(state: &mut LedgerState, ctx: &TxContext<'_>, proposal_id: ProposalId) -> Result<GameId> {
    let proposal = state
        .proposals
        .get(proposal_id)
        .cloned()
        .ok_or(BingoError::UnknownProposal(proposal_id))?;

    let game_id = state.games.next_game_id();
    let game = GameActivator::new(&ctx.entropy).activate(&proposal, game_id, &mut state.boards, ctx.now)?;
    let escrow = state.proposals.mark_active(proposal_id, game_id)?;
    state.payouts.open_pool(game_id, escrow)?;

    let first_token = game.first_token_id;
    let board_count = game.board_count;
    state.games.insert(game)?;

    state.record(
        ctx.now,
        EventKind::GameActivated {
            game_id,
            proposal_id,
            escrow,
            first_token,
            board_count,
        },
    );
    tracing::info!(
        "Proposal {} filled: game {} live with {} boards and {} wei in escrow",
        proposal_id,
        game_id,
        board_count,
        escrow
    );

    Ok(game_id)
}
