use crate::badge::{WinnerBadge, WinnerBadges};
use crate::board::{BoardRegistry, BoardToken};
use crate::error::{BingoError, Result};
use crate::events::LedgerEvent;
use crate::game::{Game, GameRegistry};
use crate::ledger::LedgerState;
use crate::payout::{EscrowPool, PayoutLedger};
use crate::proposal::{GameProposal, ProposalRegistry};
use crate::storage::Storage;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

const NEXT_PROPOSAL_ID: &str = "next_proposal_id";
const NEXT_GAME_ID: &str = "next_game_id";
const NEXT_TOKEN_ID: &str = "next_token_id";
const REVISION: &str = "revision";

/// Persists the whole ledger, one row per entity keyed by its id.
pub struct LedgerStore<'a> {
    storage: &'a Storage,
}

impl<'a> LedgerStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Replaces the stored ledger with `state` in a single transaction.
    pub async fn save_state(&self, state: &LedgerState) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        for table in ["proposals", "games", "boards", "escrow_pools", "badges", "events", "meta"] {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }

        for proposal in state.proposals.iter() {
            tx.execute(
                "INSERT INTO proposals (id, creator, status, data) VALUES (?1, ?2, ?3, ?4)",
                params![
                    proposal.id as i64,
                    proposal.creator.to_string(),
                    format!("{:?}", proposal.status),
                    serde_json::to_string(proposal)?,
                ],
            )?;
        }

        for game in state.games.iter() {
            tx.execute(
                "INSERT INTO games (id, proposal_id, status, data) VALUES (?1, ?2, ?3, ?4)",
                params![
                    game.id as i64,
                    game.source_proposal_id as i64,
                    format!("{:?}", game.status),
                    serde_json::to_string(game)?,
                ],
            )?;
        }

        for board in state.boards.iter() {
            tx.execute(
                "INSERT INTO boards (id, game_id, owner, data) VALUES (?1, ?2, ?3, ?4)",
                params![
                    board.id as i64,
                    board.game_id as i64,
                    board.owner.to_string(),
                    serde_json::to_string(board)?,
                ],
            )?;
        }

        for pool in state.payouts.iter() {
            tx.execute(
                "INSERT INTO escrow_pools (game_id, data) VALUES (?1, ?2)",
                params![pool.game_id as i64, serde_json::to_string(pool)?],
            )?;
        }

        for badge in state.badges.iter() {
            tx.execute(
                "INSERT INTO badges (holder, data) VALUES (?1, ?2)",
                params![badge.holder.to_string(), serde_json::to_string(badge)?],
            )?;
        }

        for event in &state.events {
            tx.execute(
                "INSERT INTO events (sequence, timestamp, data) VALUES (?1, ?2, ?3)",
                params![
                    event.sequence as i64,
                    event.timestamp,
                    serde_json::to_string(event)?,
                ],
            )?;
        }

        for (key, value) in [
            (NEXT_PROPOSAL_ID, state.proposals.next_proposal_id()),
            (NEXT_GAME_ID, state.games.next_game_id()),
            (NEXT_TOKEN_ID, state.boards.next_token_id()),
            (REVISION, state.revision),
        ] {
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)",
                params![key, value as i64],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            "Saved ledger at revision {} ({} events)",
            state.revision,
            state.events.len()
        );
        Ok(())
    }

    /// Loads the stored ledger; an empty database yields a fresh ledger.
    pub async fn load_state(&self) -> Result<LedgerState> {
        let conn = self.storage.get_connection().await;

        let revision = match read_meta(&conn, REVISION)? {
            Some(revision) => revision,
            None => return Ok(LedgerState::new()),
        };

        let proposals: Vec<GameProposal> = read_rows(&conn, "SELECT data FROM proposals ORDER BY id")?;
        let games: Vec<Game> = read_rows(&conn, "SELECT data FROM games ORDER BY id")?;
        let boards: Vec<BoardToken> = read_rows(&conn, "SELECT data FROM boards ORDER BY id")?;
        let pools: Vec<EscrowPool> = read_rows(&conn, "SELECT data FROM escrow_pools ORDER BY game_id")?;
        let badges: Vec<WinnerBadge> = read_rows(&conn, "SELECT data FROM badges ORDER BY holder")?;
        let events: Vec<LedgerEvent> = read_rows(&conn, "SELECT data FROM events ORDER BY sequence")?;

        let counter = |key: &str| -> Result<u64> {
            read_meta(&conn, key)?
                .ok_or_else(|| BingoError::internal(format!("missing ledger counter {}", key)))
        };

        let state = LedgerState {
            proposals: ProposalRegistry::restore(proposals, counter(NEXT_PROPOSAL_ID)?),
            games: GameRegistry::restore(games, counter(NEXT_GAME_ID)?),
            boards: BoardRegistry::restore(boards, counter(NEXT_TOKEN_ID)?),
            badges: WinnerBadges::restore(badges),
            payouts: PayoutLedger::restore(pools),
            events,
            revision,
        };

        tracing::debug!("Loaded ledger at revision {}", state.revision);
        Ok(state)
    }

    pub async fn revision(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;
        Ok(read_meta(&conn, REVISION)?.unwrap_or(0))
    }
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<u64>> {
    let value: Option<i64> = conn
        .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
        .optional()?;
    Ok(value.map(|v| v as u64))
}

fn read_rows<T: DeserializeOwned>(conn: &Connection, sql: &str) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut items = Vec::new();
    for row in rows {
        items.push(serde_json::from_str(&row?)?);
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BingoConfig;
    use crate::host::{FixedEntropy, ManualClock};
    use crate::house::BingoHouse;
    use crate::proposal::ProposalParams;
    use crate::types::Address;
    use std::sync::Arc;
    use tempfile::tempdir;

    const BUY_IN: u128 = 1_000_000_000_000_000;

    fn house_with_live_game() -> BingoHouse {
        let clock = Arc::new(ManualClock::new(1_000));
        let house = BingoHouse::new(BingoConfig::default())
            .unwrap()
            .with_clock(clock.clone())
            .with_entropy(Arc::new(FixedEntropy::from_u64(3)));

        let params = ProposalParams {
            wei_buy_in: BUY_IN,
            draw_interval_sec: 0,
            num_players_required: 2,
            max_cards_per_player: 10,
            cards: 2,
        };
        house
            .create_proposal(Address::from_low_u64_be(1), params, 2 * BUY_IN)
            .unwrap();
        house
            .join_proposal(Address::from_low_u64_be(2), 1, 1, BUY_IN)
            .unwrap();
        house.create_proposal(Address::from_low_u64_be(3), params, 2 * BUY_IN).unwrap();
        for _ in 0..75 {
            house.draw_number(1).unwrap();
        }
        house.claim_bingo(Address::from_low_u64_be(2), 1, 2).unwrap();
        clock.advance(1_000);
        house.get_winnings(Address::from_low_u64_be(2), 1).unwrap();
        house
    }

    #[tokio::test]
    async fn test_empty_store_loads_fresh_ledger() {
        let storage = Storage::in_memory().await.unwrap();
        let store = LedgerStore::new(&storage);
        assert_eq!(store.load_state().await.unwrap(), LedgerState::new());
        assert_eq!(store.revision().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("ledger.db");
        let state = house_with_live_game().snapshot();

        {
            let storage = Storage::new(&db_path).await.unwrap();
            LedgerStore::new(&storage).save_state(&state).await.unwrap();
        }

        let storage = Storage::new(&db_path).await.unwrap();
        let store = LedgerStore::new(&storage);
        let loaded = store.load_state().await.unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.revision().await.unwrap(), state.revision);

        let resumed = BingoHouse::with_state(BingoConfig::default(), loaded).unwrap();
        assert!(resumed.is_badge_holder(&Address::from_low_u64_be(2)));
        assert!(resumed.proposal(2).is_some());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_state() {
        let storage = Storage::in_memory().await.unwrap();
        let store = LedgerStore::new(&storage);

        store.save_state(&house_with_live_game().snapshot()).await.unwrap();
        store.save_state(&LedgerState::new()).await.unwrap();

        let loaded = store.load_state().await.unwrap();
        assert_eq!(loaded, LedgerState::new());
    }
}
