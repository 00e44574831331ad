//! Standard bingo win lines: any full row, column or diagonal. The free
//! center always counts as drawn.

use crate::board::{BoardLayout, BOARD_SIZE, FREE, HIGHEST_NUMBER};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WinLine {
    Row(usize),
    Column(usize),
    Diagonal,
    AntiDiagonal,
}

impl WinLine {
    fn cells(self) -> [(usize, usize); BOARD_SIZE] {
        let mut cells = [(0, 0); BOARD_SIZE];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = match self {
                WinLine::Row(r) => (r, i),
                WinLine::Column(c) => (i, c),
                WinLine::Diagonal => (i, i),
                WinLine::AntiDiagonal => (i, BOARD_SIZE - 1 - i),
            };
        }
        cells
    }

    pub fn all() -> impl Iterator<Item = WinLine> {
        (0..BOARD_SIZE)
            .map(WinLine::Row)
            .chain((0..BOARD_SIZE).map(WinLine::Column))
            .chain([WinLine::Diagonal, WinLine::AntiDiagonal])
    }
}

/// Membership table for drawn numbers, indexed by value.
#[derive(Debug, Clone)]
pub struct DrawnSet([bool; HIGHEST_NUMBER as usize + 1]);

impl DrawnSet {
    pub fn from_numbers(numbers: &[u8]) -> Self {
        let mut set = [false; HIGHEST_NUMBER as usize + 1];
        set[FREE as usize] = true;
        for &n in numbers {
            if let Some(slot) = set.get_mut(n as usize) {
                *slot = true;
            }
        }
        Self(set)
    }

    pub fn contains(&self, number: u8) -> bool {
        self.0.get(number as usize).copied().unwrap_or(false)
    }
}

/// First completed line on `layout`, if any.
pub fn find_winning_line(layout: &BoardLayout, drawn: &DrawnSet) -> Option<WinLine> {
    WinLine::all().find(|line| {
        line.cells()
            .iter()
            .all(|&(r, c)| drawn.contains(layout.cell(r, c)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BoardLayout {
        BoardLayout::from_cells([
            [1, 16, 31, 46, 61],
            [2, 17, 32, 47, 62],
            [3, 18, FREE, 48, 63],
            [4, 19, 34, 49, 64],
            [5, 20, 35, 50, 65],
        ])
    }

    #[test]
    fn test_no_draws_no_win() {
        assert_eq!(find_winning_line(&sample(), &DrawnSet::from_numbers(&[])), None);
    }

    #[test]
    fn test_row_win() {
        let drawn = DrawnSet::from_numbers(&[2, 17, 32, 47, 62, 70]);
        assert_eq!(find_winning_line(&sample(), &drawn), Some(WinLine::Row(1)));
    }

    #[test]
    fn test_column_win() {
        let drawn = DrawnSet::from_numbers(&[46, 47, 48, 49, 50]);
        assert_eq!(find_winning_line(&sample(), &drawn), Some(WinLine::Column(3)));
    }

    #[test]
    fn test_free_center_counts_for_lines_through_it() {
        let drawn = DrawnSet::from_numbers(&[3, 18, 48, 63]);
        assert_eq!(find_winning_line(&sample(), &drawn), Some(WinLine::Row(2)));

        let drawn = DrawnSet::from_numbers(&[1, 17, 49, 65]);
        assert_eq!(find_winning_line(&sample(), &drawn), Some(WinLine::Diagonal));

        let drawn = DrawnSet::from_numbers(&[61, 47, 19, 5]);
        assert_eq!(find_winning_line(&sample(), &drawn), Some(WinLine::AntiDiagonal));
    }

    #[test]
    fn test_incomplete_line_does_not_win() {
        let drawn = DrawnSet::from_numbers(&[1, 2, 3, 4, 16, 17, 18, 19]);
        assert_eq!(find_winning_line(&sample(), &drawn), None);
    }
}
