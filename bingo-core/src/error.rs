use crate::types::{Address, GameId, ProposalId, TokenId, Wei};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BingoError>;

/// Broad category of a rejected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    State,
    Authorization,
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum BingoError {
    // validation
    #[error("MIN_WEI_BUY_IN not met: {buy_in} < {min}")]
    InvalidBuyIn { buy_in: Wei, min: Wei },

    #[error("drawTimeIntervalSec {interval} > MAX_DRAW_INTERVAL_SEC {max}")]
    IntervalTooLong { interval: u64, max: u64 },

    #[error("MIN_NUM_PLAYERS not met: {requested} < {min}")]
    TooFewPlayers { requested: u32, min: u32 },

    #[error("May not request more than {max} cards per player (requested {requested})")]
    TooManyCards { requested: u32, max: u32 },

    #[error("At least one card must be requested")]
    ZeroCards,

    #[error("Value must be >= weiBuyIn * numCardsDesired: need {need}, paid {paid}")]
    InsufficientPayment { need: Wei, paid: Wei },

    #[error("Stake of {cards} card(s) at {buy_in} wei overflows the escrow")]
    AmountOverflow { buy_in: Wei, cards: u32 },

    // state
    #[error("Proposal not found: {0}")]
    UnknownProposal(ProposalId),

    #[error("Must select an active gameProposal: {0}")]
    ProposalNotActive(ProposalId),

    #[error("Game not found: {0}")]
    UnknownGame(GameId),

    #[error("Board token not found: {0}")]
    UnknownToken(TokenId),

    #[error("Game {0} is not drawing")]
    GameClosed(GameId),

    #[error("Next draw for game {game_id} is not allowed before {next_draw_at}")]
    DrawTooEarly { game_id: GameId, next_draw_at: i64 },

    #[error("Can only claim bingo on this game's cards: token {token_id} belongs to game {token_game}")]
    WrongGame { token_id: TokenId, token_game: GameId },

    #[error("Cannot claim bingo twice for board {0}")]
    AlreadyClaimed(TokenId),

    #[error("Claims for game {0} open once all numbers are drawn")]
    ClaimWindowNotOpen(GameId),

    #[error("Claim window for game {0} has closed")]
    ClaimWindowClosed(GameId),

    #[error("Board {0} has no completed row, column or diagonal")]
    NoWinningPattern(TokenId),

    #[error("Claim window for game {0} has not closed yet")]
    ClaimWindowNotClosed(GameId),

    #[error("Winner can not be paid twice: {0}")]
    AlreadyPaid(Address),

    #[error("No refund owed to {0}")]
    NothingToRefund(Address),

    #[error("Game activation failed: {0}")]
    ActivationFailed(String),

    // authorization
    #[error("Only the board owner can use token {0}")]
    NotBoardOwner(TokenId),

    #[error("Only winners can collect winnings: {0}")]
    NotAWinner(Address),

    #[error("Only the proposal creator can cancel proposal {0}")]
    NotProposalCreator(ProposalId),

    // infrastructure
    #[error("Transfer of {amount} wei to {to} failed: {reason}")]
    Transfer { to: Address, amount: Wei, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BingoError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn activation(msg: impl Into<String>) -> Self {
        Self::ActivationFailed(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        use BingoError::*;
        match self {
            InvalidBuyIn { .. }
            | IntervalTooLong { .. }
            | TooFewPlayers { .. }
            | TooManyCards { .. }
            | ZeroCards
            | InsufficientPayment { .. }
            | AmountOverflow { .. } => ErrorKind::Validation,

            UnknownProposal(_)
            | ProposalNotActive(_)
            | UnknownGame(_)
            | UnknownToken(_)
            | GameClosed(_)
            | DrawTooEarly { .. }
            | WrongGame { .. }
            | AlreadyClaimed(_)
            | ClaimWindowNotOpen(_)
            | ClaimWindowClosed(_)
            | NoWinningPattern(_)
            | ClaimWindowNotClosed(_)
            | AlreadyPaid(_)
            | NothingToRefund(_)
            | ActivationFailed(_) => ErrorKind::State,

            NotBoardOwner(_) | NotAWinner(_) | NotProposalCreator(_) => ErrorKind::Authorization,

            Transfer { .. }
            | Storage(_)
            | Serialization(_)
            | Config(_)
            | InvalidAddress(_)
            | Io(_)
            | Internal(_) => ErrorKind::Infrastructure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(BingoError::ZeroCards.kind(), ErrorKind::Validation);
        assert_eq!(BingoError::AlreadyClaimed(3).kind(), ErrorKind::State);
        assert_eq!(BingoError::NotBoardOwner(3).kind(), ErrorKind::Authorization);
        assert_eq!(
            BingoError::internal("boom").kind(),
            ErrorKind::Infrastructure
        );
    }
}
