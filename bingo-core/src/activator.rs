//! Turns a filled proposal into a live game and mints its boards.

use crate::board::{BoardLayout, BoardRegistry};
use crate::error::{BingoError, Result};
use crate::game::{Game, GameStatus};
use crate::proposal::{GameProposal, ProposalStatus};
use crate::seed::board_seed;
use crate::types::GameId;
use std::collections::{BTreeSet, HashSet};

pub struct GameActivator<'a> {
    entropy: &'a [u8; 32],
}

impl<'a> GameActivator<'a> {
    pub fn new(entropy: &'a [u8; 32]) -> Self {
        Self { entropy }
    }

    /// Builds game `game_id` from `proposal`, minting one board per requested
    /// card in enrollment order. The caller owns rollback: on error, `boards`
    /// must be discarded along with the rest of the working state.
    pub fn activate(
        &self,
        proposal: &GameProposal,
        game_id: GameId,
        boards: &mut BoardRegistry,
        now: i64,
    ) -> Result<Game> {
        if proposal.status != ProposalStatus::Open {
            return Err(BingoError::ProposalNotActive(proposal.id));
        }

        let first_token_id = boards.next_token_id();
        let mut layouts = HashSet::new();

        for enrollment in &proposal.enrollments {
            for card_index in 0..enrollment.cards_requested {
                let seed = board_seed(self.entropy, game_id, &enrollment.player, card_index);
                let layout = BoardLayout::from_seed(seed);
                if !layouts.insert(layout) {
                    return Err(BingoError::activation(format!(
                        "duplicate board layout for {} card {} in game {}",
                        enrollment.player, card_index, game_id
                    )));
                }
                boards.mint(enrollment.player, game_id, layout)?;
            }
        }

        let board_count = boards.next_token_id() - first_token_id;
        if board_count != proposal.total_cards() {
            return Err(BingoError::activation(format!(
                "minted {} boards for {} cards",
                board_count,
                proposal.total_cards()
            )));
        }

        Ok(Game {
            id: game_id,
            source_proposal_id: proposal.id,
            drawn_numbers: Vec::new(),
            draw_interval_sec: proposal.draw_interval_sec,
            last_draw_timestamp: now,
            status: GameStatus::Drawing,
            claim_window_close_timestamp: None,
            winner_token_ids: BTreeSet::new(),
            winners: BTreeSet::new(),
            players: proposal.enrollments.iter().map(|e| e.player).collect(),
            first_token_id,
            board_count,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BingoConfig;
    use crate::proposal::{ProposalParams, ProposalRegistry};
    use crate::types::Address;

    const BUY_IN: u128 = 1_000_000_000_000_000;

    fn filled_proposal() -> GameProposal {
        let mut registry = ProposalRegistry::new();
        let params = ProposalParams {
            wei_buy_in: BUY_IN,
            draw_interval_sec: 10,
            num_players_required: 2,
            max_cards_per_player: 10,
            cards: 1,
        };
        let (id, _) = registry
            .create(&BingoConfig::default(), Address::from_low_u64_be(0), params, BUY_IN, 0)
            .unwrap();
        registry
            .join(id, Address::from_low_u64_be(1), 3, 3 * BUY_IN)
            .unwrap();
        registry.get(id).unwrap().clone()
    }

    #[test]
    fn test_activation_mints_boards_in_enrollment_order() {
        let proposal = filled_proposal();
        let mut boards = BoardRegistry::new();
        let game = GameActivator::new(&[4u8; 32])
            .activate(&proposal, 1, &mut boards, 100)
            .unwrap();

        assert_eq!(game.board_count, 4);
        assert_eq!(game.first_token_id, 0);
        assert_eq!(game.last_draw_timestamp, 100);
        assert_eq!(game.draw_interval_sec, 10);
        assert_eq!(boards.get(0).unwrap().owner, Address::from_low_u64_be(0));
        assert!((1..4).all(|id| boards.get(id).unwrap().owner == Address::from_low_u64_be(1)));
    }

    #[test]
    fn test_activation_is_reproducible() {
        let proposal = filled_proposal();
        let mut first = BoardRegistry::new();
        let mut second = BoardRegistry::new();
        GameActivator::new(&[4u8; 32]).activate(&proposal, 1, &mut first, 0).unwrap();
        GameActivator::new(&[4u8; 32]).activate(&proposal, 1, &mut second, 0).unwrap();
        assert_eq!(first, second);

        let mut other = BoardRegistry::new();
        GameActivator::new(&[5u8; 32]).activate(&proposal, 1, &mut other, 0).unwrap();
        assert_ne!(first.get(0).unwrap().layout, other.get(0).unwrap().layout);
    }
}
