use crate::error::{BingoError, Result};
use crate::types::Wei;
use serde::{Deserialize, Serialize};

pub const MIN_WEI_BUY_IN: Wei = 1_000_000_000_000_000; // 0.001 ether
pub const MAX_DRAW_INTERVAL_SEC: u64 = 60;
pub const MIN_NUM_PLAYERS: u32 = 2;
pub const MAX_CARDS_PER_PLAYER: u32 = 10;
pub const CLAIM_GRACE_SEC: i64 = 120;

/// When a bingo claim may be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ClaimPolicy {
    /// Any completed line counts, even while numbers are still being drawn.
    #[default]
    AnyDrawnState,
    /// Claims are only accepted once all 75 numbers are out.
    AfterFullDraw,
}

/// Game rules enforced by the house.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BingoConfig {
    pub min_wei_buy_in: Wei,
    pub max_draw_interval_sec: u64,
    pub min_num_players: u32,
    pub max_cards_per_player: u32,
    pub claim_grace_sec: i64,
    pub claim_policy: ClaimPolicy,
}

impl Default for BingoConfig {
    fn default() -> Self {
        Self {
            min_wei_buy_in: MIN_WEI_BUY_IN,
            max_draw_interval_sec: MAX_DRAW_INTERVAL_SEC,
            min_num_players: MIN_NUM_PLAYERS,
            max_cards_per_player: MAX_CARDS_PER_PLAYER,
            claim_grace_sec: CLAIM_GRACE_SEC,
            claim_policy: ClaimPolicy::default(),
        }
    }
}

impl BingoConfig {
    pub fn with_claim_policy(mut self, claim_policy: ClaimPolicy) -> Self {
        self.claim_policy = claim_policy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_wei_buy_in == 0 {
            return Err(BingoError::config("Minimum buy-in must be greater than 0"));
        }

        if self.min_num_players < 2 {
            return Err(BingoError::config("A game needs at least 2 players"));
        }

        if self.max_cards_per_player == 0 {
            return Err(BingoError::config(
                "Max cards per player must be greater than 0",
            ));
        }

        if self.claim_grace_sec < 0 {
            return Err(BingoError::config("Claim grace period cannot be negative"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BingoConfig::default();
        config.validate().unwrap();
        assert_eq!(config.claim_policy, ClaimPolicy::AnyDrawnState);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BingoConfig =
            serde_json::from_str(r#"{"claim_policy":"AfterFullDraw","min_num_players":3}"#).unwrap();
        assert_eq!(config.claim_policy, ClaimPolicy::AfterFullDraw);
        assert_eq!(config.min_num_players, 3);
        assert_eq!(config.max_cards_per_player, MAX_CARDS_PER_PLAYER);
    }

    #[test]
    fn test_rejects_single_player_games() {
        let config = BingoConfig {
            min_num_players: 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BingoError::Config(_))));
    }
}
