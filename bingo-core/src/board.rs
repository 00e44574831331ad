use crate::error::{BingoError, Result};
use crate::types::{Address, GameId, TokenId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const BOARD_SIZE: usize = 5;
pub const HIGHEST_NUMBER: u8 = 75;
/// Marker for the free center cell.
pub const FREE: u8 = 0;

/// Fixed 5x5 card. Rows are outer, columns inner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardLayout {
    cells: [[u8; BOARD_SIZE]; BOARD_SIZE],
}

impl BoardLayout {
    /// Lays the first 24 values of a seeded shuffle of 1..=75 into the grid,
    /// row by row, leaving the center free.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let mut rng = StdRng::from_seed(seed);
        let mut numbers: Vec<u8> = (1..=HIGHEST_NUMBER).collect();
        numbers.shuffle(&mut rng);

        let mut cells = [[FREE; BOARD_SIZE]; BOARD_SIZE];
        let mut next = numbers.into_iter();
        for (r, row) in cells.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                if r == BOARD_SIZE / 2 && c == BOARD_SIZE / 2 {
                    continue;
                }
                *cell = next.next().unwrap_or(FREE);
            }
        }

        Self { cells }
    }

    pub fn from_cells(cells: [[u8; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    pub fn cell(&self, row: usize, col: usize) -> u8 {
        self.cells[row][col]
    }

    pub fn rows(&self) -> &[[u8; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }
}

impl fmt::Display for BoardLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            let line: Vec<String> = row
                .iter()
                .map(|&n| if n == FREE { "  *".to_string() } else { format!("{:>3}", n) })
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// One bingo card in one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardToken {
    pub id: TokenId,
    pub owner: Address,
    pub game_id: GameId,
    pub layout: BoardLayout,
    pub has_won: bool,
}

/// Board tokens keyed by a globally sequential id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardRegistry {
    tokens: BTreeMap<TokenId, BoardToken>,
    next_token_id: TokenId,
}

impl BoardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_token_id(&self) -> TokenId {
        self.next_token_id
    }

    pub fn mint(&mut self, owner: Address, game_id: GameId, layout: BoardLayout) -> Result<TokenId> {
        let id = self.next_token_id;
        self.next_token_id = id
            .checked_add(1)
            .ok_or_else(|| BingoError::activation("board token ids exhausted"))?;

        self.tokens.insert(
            id,
            BoardToken {
                id,
                owner,
                game_id,
                layout,
                has_won: false,
            },
        );

        tracing::debug!("Minted board {} for {} in game {}", id, owner, game_id);
        Ok(id)
    }

    pub fn get(&self, token_id: TokenId) -> Option<&BoardToken> {
        self.tokens.get(&token_id)
    }

    pub fn get_mut(&mut self, token_id: TokenId) -> Option<&mut BoardToken> {
        self.tokens.get_mut(&token_id)
    }

    pub fn tokens_of<'a>(&'a self, owner: &'a Address, game_id: GameId) -> impl Iterator<Item = &'a BoardToken> + 'a {
        self.tokens
            .values()
            .filter(move |t| t.game_id == game_id && &t.owner == owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoardToken> {
        self.tokens.values()
    }

    pub fn tokens_in_game(&self, game_id: GameId) -> impl Iterator<Item = &BoardToken> + '_ {
        self.tokens.values().filter(move |t| t.game_id == game_id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub(crate) fn restore(tokens: Vec<BoardToken>, next_token_id: TokenId) -> Self {
        Self {
            tokens: tokens.into_iter().map(|t| (t.id, t)).collect(),
            next_token_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_layout_has_free_center_and_unique_numbers() {
        let layout = BoardLayout::from_seed([3u8; 32]);
        assert_eq!(layout.cell(2, 2), FREE);

        let numbers: Vec<u8> = layout.rows().iter().flatten().copied().filter(|&n| n != FREE).collect();
        assert_eq!(numbers.len(), 24);
        assert!(numbers.iter().all(|&n| (1..=HIGHEST_NUMBER).contains(&n)));
        assert_eq!(numbers.iter().collect::<HashSet<_>>().len(), 24);
    }

    #[test]
    fn test_layout_is_reproducible_from_seed() {
        assert_eq!(BoardLayout::from_seed([9u8; 32]), BoardLayout::from_seed([9u8; 32]));
        assert_ne!(BoardLayout::from_seed([9u8; 32]), BoardLayout::from_seed([10u8; 32]));
    }

    #[test]
    fn test_mint_assigns_sequential_ids() {
        let mut boards = BoardRegistry::new();
        let alice = Address::from_low_u64_be(1);
        let bob = Address::from_low_u64_be(2);
        let layout = BoardLayout::from_seed([1u8; 32]);

        assert_eq!(boards.mint(alice, 1, layout).unwrap(), 0);
        assert_eq!(boards.mint(bob, 1, layout).unwrap(), 1);
        assert_eq!(boards.mint(alice, 2, layout).unwrap(), 2);

        assert_eq!(boards.tokens_of(&alice, 1).count(), 1);
        assert_eq!(boards.tokens_in_game(1).count(), 2);
        assert_eq!(boards.next_token_id(), 3);
        assert!(!boards.get(1).unwrap().has_won);
    }
}
