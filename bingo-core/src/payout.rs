use crate::error::{BingoError, Result};
use crate::game::{Game, GameStatus};
use crate::types::{Address, GameId, Wei};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Escrowed funds of one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowPool {
    pub game_id: GameId,
    pub total: Wei,
    pub paid_out: Wei,
    pub paid: BTreeSet<Address>,
}

impl EscrowPool {
    /// Funds still held, including integer-division dust.
    pub fn remaining(&self) -> Wei {
        self.total - self.paid_out
    }

    pub fn has_been_paid(&self, address: &Address) -> bool {
        self.paid.contains(address)
    }
}

/// Bookkeeping result of a payout; the transfer itself happens afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub amount: Wei,
    pub game_closed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayoutLedger {
    pools: BTreeMap<GameId, EscrowPool>,
}

impl PayoutLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_pool(&mut self, game_id: GameId, total: Wei) -> Result<()> {
        if self.pools.contains_key(&game_id) {
            return Err(BingoError::activation(format!(
                "escrow pool for game {} already exists",
                game_id
            )));
        }
        self.pools.insert(
            game_id,
            EscrowPool {
                game_id,
                total,
                paid_out: 0,
                paid: BTreeSet::new(),
            },
        );
        Ok(())
    }

    pub fn pool(&self, game_id: GameId) -> Option<&EscrowPool> {
        self.pools.get(&game_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EscrowPool> {
        self.pools.values()
    }

    /// Records the caller's equal share as paid. Every check and every state
    /// change happens here so the caller can transfer strictly afterwards.
    pub fn settle(&mut self, game: &mut Game, caller: &Address, now: i64) -> Result<Settlement> {
        let window_closed = game.status != GameStatus::Drawing && game.claim_window_elapsed(now);
        if !window_closed {
            return Err(BingoError::ClaimWindowNotClosed(game.id));
        }

        if !game.is_winner(caller) {
            return Err(BingoError::NotAWinner(*caller));
        }

        let pool = self
            .pools
            .get_mut(&game.id)
            .ok_or_else(|| BingoError::internal(format!("no escrow pool for game {}", game.id)))?;

        if pool.has_been_paid(caller) {
            return Err(BingoError::AlreadyPaid(*caller));
        }

        let share = pool.total / game.winner_count() as Wei;
        if share > pool.remaining() {
            return Err(BingoError::internal(format!(
                "escrow pool for game {} cannot cover share {}",
                game.id, share
            )));
        }

        pool.paid.insert(*caller);
        pool.paid_out += share;

        let game_closed = game.winners.iter().all(|w| pool.paid.contains(w));
        if game_closed {
            game.status = GameStatus::Closed;
        }

        Ok(Settlement {
            amount: share,
            game_closed,
        })
    }

    pub(crate) fn restore(pools: Vec<EscrowPool>) -> Self {
        Self {
            pools: pools.into_iter().map(|p| (p.game_id, p)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn finished_game(winners: &[u64]) -> Game {
        Game {
            id: 1,
            source_proposal_id: 1,
            drawn_numbers: (1..=75).collect(),
            draw_interval_sec: 0,
            last_draw_timestamp: 0,
            status: GameStatus::ClaimWindowOpen,
            claim_window_close_timestamp: Some(100),
            winner_token_ids: (0..winners.len() as u64).collect(),
            winners: winners.iter().map(|&n| addr(n)).collect(),
            players: winners.iter().map(|&n| addr(n)).collect(),
            first_token_id: 0,
            board_count: winners.len() as u64,
            created_at: 0,
        }
    }

    #[test]
    fn test_window_must_close_first() {
        let mut ledger = PayoutLedger::new();
        ledger.open_pool(1, 90).unwrap();
        let mut game = finished_game(&[1]);

        assert!(matches!(
            ledger.settle(&mut game, &addr(1), 99),
            Err(BingoError::ClaimWindowNotClosed(1))
        ));

        game.status = GameStatus::Drawing;
        game.claim_window_close_timestamp = None;
        assert!(matches!(
            ledger.settle(&mut game, &addr(1), 1_000),
            Err(BingoError::ClaimWindowNotClosed(1))
        ));
    }

    #[test]
    fn test_equal_shares_keep_dust() {
        let mut ledger = PayoutLedger::new();
        ledger.open_pool(1, 100).unwrap();
        let mut game = finished_game(&[1, 2, 3]);

        assert!(matches!(
            ledger.settle(&mut game, &addr(4), 100),
            Err(BingoError::NotAWinner(_))
        ));

        let first = ledger.settle(&mut game, &addr(1), 100).unwrap();
        assert_eq!(first.amount, 33);
        assert!(!first.game_closed);
        assert!(matches!(
            ledger.settle(&mut game, &addr(1), 100),
            Err(BingoError::AlreadyPaid(_))
        ));

        assert_eq!(ledger.settle(&mut game, &addr(2), 100).unwrap().amount, 33);
        let last = ledger.settle(&mut game, &addr(3), 100).unwrap();
        assert_eq!(last.amount, 33);
        assert!(last.game_closed);
        assert_eq!(game.status, GameStatus::Closed);
        assert_eq!(ledger.pool(1).unwrap().remaining(), 1);
    }
}
