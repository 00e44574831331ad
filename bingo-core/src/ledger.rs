use crate::badge::WinnerBadges;
use crate::board::BoardRegistry;
use crate::events::{EventKind, LedgerEvent};
use crate::game::GameRegistry;
use crate::payout::PayoutLedger;
use crate::proposal::ProposalRegistry;
use serde::{Deserialize, Serialize};

/// Everything the house owns. Mutated only through `BingoHouse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub proposals: ProposalRegistry,
    pub games: GameRegistry,
    pub boards: BoardRegistry,
    pub badges: WinnerBadges,
    pub payouts: PayoutLedger,
    pub events: Vec<LedgerEvent>,
    /// Number of committed transactions.
    pub revision: u64,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            proposals: ProposalRegistry::new(),
            games: GameRegistry::new(),
            boards: BoardRegistry::new(),
            badges: WinnerBadges::new(),
            payouts: PayoutLedger::new(),
            events: Vec::new(),
            revision: 0,
        }
    }
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, timestamp: i64, kind: EventKind) {
        let sequence = self.events.len() as u64;
        self.events.push(LedgerEvent {
            sequence,
            timestamp,
            kind,
        });
    }
}
