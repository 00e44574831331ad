use crate::pattern::WinLine;
use crate::types::{Address, GameId, ProposalId, TokenId, Wei};
use serde::{Deserialize, Serialize};

/// Committed transition recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    ProposalCreated {
        proposal_id: ProposalId,
        creator: Address,
        wei_buy_in: Wei,
        num_players_required: u32,
    },
    PlayerJoined {
        proposal_id: ProposalId,
        player: Address,
        cards: u32,
        escrow: Wei,
    },
    ProposalCancelled {
        proposal_id: ProposalId,
    },
    RefundWithdrawn {
        proposal_id: ProposalId,
        player: Address,
        amount: Wei,
    },
    GameActivated {
        game_id: GameId,
        proposal_id: ProposalId,
        escrow: Wei,
        first_token: TokenId,
        board_count: u64,
    },
    NumberDrawn {
        game_id: GameId,
        number: u8,
        draw_index: usize,
    },
    ClaimWindowOpened {
        game_id: GameId,
        closes_at: i64,
    },
    BingoClaimed {
        game_id: GameId,
        token_id: TokenId,
        winner: Address,
        line: WinLine,
    },
    WinningsPaid {
        game_id: GameId,
        winner: Address,
        amount: Wei,
    },
    BadgeMinted {
        holder: Address,
    },
    GameClosed {
        game_id: GameId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub sequence: u64,
    pub timestamp: i64,
    pub kind: EventKind,
}
