pub mod ledger_store;

pub use ledger_store::LedgerStore;

use crate::error::{BingoError, Result};
use rusqlite::Connection;
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BingoError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    pub async fn in_memory() -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS proposals (
                id INTEGER PRIMARY KEY,
                creator TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY,
                proposal_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                FOREIGN KEY (proposal_id) REFERENCES proposals(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS boards (
                id INTEGER PRIMARY KEY,
                game_id INTEGER NOT NULL,
                owner TEXT NOT NULL,
                data TEXT NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS escrow_pools (
                game_id INTEGER PRIMARY KEY,
                data TEXT NOT NULL,
                FOREIGN KEY (game_id) REFERENCES games(id)
            )",
            [],
        )?;

        // Winner badges, one row per holding address
        conn.execute(
            "CREATE TABLE IF NOT EXISTS badges (
                holder TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS events (
                sequence INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
            [],
        )?;

        // Id counters and the committed revision
        conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
