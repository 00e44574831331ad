use crate::types::{Address, GameId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerBadge {
    pub holder: Address,
    pub first_game_id: GameId,
    pub minted_at: i64,
}

/// Non-transferable winner badges. Membership only: an address holds one
/// or it does not, and there is no way to move a badge once minted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WinnerBadges {
    badges: BTreeMap<Address, WinnerBadge>,
}

impl WinnerBadges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a badge for `holder` unless one is already held. Returns whether
    /// a new badge was minted.
    pub fn mint(&mut self, holder: Address, game_id: GameId, now: i64) -> bool {
        if self.badges.contains_key(&holder) {
            return false;
        }
        self.badges.insert(
            holder,
            WinnerBadge {
                holder,
                first_game_id: game_id,
                minted_at: now,
            },
        );
        true
    }

    pub fn is_holder(&self, address: &Address) -> bool {
        self.badges.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Option<&WinnerBadge> {
        self.badges.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WinnerBadge> {
        self.badges.values()
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    pub(crate) fn restore(badges: Vec<WinnerBadge>) -> Self {
        Self {
            badges: badges.into_iter().map(|b| (b.holder, b)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_is_idempotent() {
        let mut badges = WinnerBadges::new();
        let alice = Address::from_low_u64_be(1);

        assert!(badges.mint(alice, 1, 100));
        assert!(!badges.mint(alice, 2, 200));
        assert_eq!(badges.len(), 1);
        assert_eq!(badges.get(&alice).unwrap().first_game_id, 1);
        assert!(!badges.is_holder(&Address::from_low_u64_be(2)));
    }
}
