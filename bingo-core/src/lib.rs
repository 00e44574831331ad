//! Buy-in bingo on a shared ledger.
//!
//! Players stake funds into a proposal; once enough players have joined the
//! proposal becomes a live game with one board token per card. Numbers are
//! drawn until all 75 are out, winners claim against their boards, and after
//! the claim window closes each distinct winner collects an equal share of
//! the escrow along with a non-transferable winner badge.

pub mod activator;
pub mod badge;
pub mod board;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod host;
pub mod house;
pub mod ledger;
pub mod pattern;
pub mod payout;
pub mod proposal;
pub mod seed;
pub mod storage;
pub mod types;

pub use board::{BoardLayout, BoardToken};
pub use config::{BingoConfig, ClaimPolicy};
pub use error::{BingoError, ErrorKind, Result};
pub use events::{EventKind, LedgerEvent};
pub use game::{Game, GameStatus};
pub use host::{Clock, EntropySource, FixedEntropy, FundsTransport, InMemoryTransport, ManualClock, OsEntropy, SystemClock};
pub use house::{BingoHouse, JoinOutcome};
pub use ledger::LedgerState;
pub use pattern::WinLine;
pub use payout::EscrowPool;
pub use proposal::{GameProposal, ProposalParams, ProposalStatus};
pub use storage::LedgerStore;
pub use types::{parse_ether, Address, GameId, ProposalId, TokenId, Wei, WEI_PER_ETHER};
