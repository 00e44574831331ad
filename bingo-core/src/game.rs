use crate::board::{BoardToken, HIGHEST_NUMBER};
use crate::config::ClaimPolicy;
use crate::error::{BingoError, Result};
use crate::pattern::{find_winning_line, DrawnSet, WinLine};
use crate::seed::{draw_seed, pick_index};
use crate::types::{Address, GameId, ProposalId, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Game state machine: `Drawing -> ClaimWindowOpen -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Drawing,
    ClaimWindowOpen,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub source_proposal_id: ProposalId,
    pub drawn_numbers: Vec<u8>,
    pub draw_interval_sec: u64,
    pub last_draw_timestamp: i64,
    pub status: GameStatus,
    pub claim_window_close_timestamp: Option<i64>,
    pub winner_token_ids: BTreeSet<TokenId>,
    /// Distinct owners of winning boards.
    pub winners: BTreeSet<Address>,
    pub players: Vec<Address>,
    pub first_token_id: TokenId,
    pub board_count: u64,
    pub created_at: i64,
}

/// What a successful draw did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawOutcome {
    pub number: u8,
    pub draw_index: usize,
    /// Set when this draw exhausted the numbers and opened the claim window.
    pub claim_window_closes_at: Option<i64>,
}

impl Game {
    pub fn is_drawn(&self, number: u8) -> bool {
        self.drawn_numbers.contains(&number)
    }

    pub fn all_drawn(&self) -> bool {
        self.drawn_numbers.len() >= HIGHEST_NUMBER as usize
    }

    pub fn next_draw_at(&self) -> i64 {
        self.last_draw_timestamp
            .saturating_add(self.draw_interval_sec as i64)
    }

    pub fn winner_count(&self) -> usize {
        self.winners.len()
    }

    pub fn is_winner(&self, address: &Address) -> bool {
        self.winners.contains(address)
    }

    /// Draws one number uniformly from those not yet drawn.
    pub fn draw_number(&mut self, entropy: &[u8; 32], now: i64, claim_grace_sec: i64) -> Result<DrawOutcome> {
        if self.status != GameStatus::Drawing {
            return Err(BingoError::GameClosed(self.id));
        }

        if now < self.next_draw_at() {
            return Err(BingoError::DrawTooEarly {
                game_id: self.id,
                next_draw_at: self.next_draw_at(),
            });
        }

        let drawn = DrawnSet::from_numbers(&self.drawn_numbers);
        let undrawn: Vec<u8> = (1..=HIGHEST_NUMBER).filter(|&n| !drawn.contains(n)).collect();
        if undrawn.is_empty() {
            return Err(BingoError::internal(format!(
                "game {} is drawing with no numbers left",
                self.id
            )));
        }

        let draw_index = self.drawn_numbers.len();
        let seed = draw_seed(entropy, self.id, draw_index);
        let number = undrawn[pick_index(&seed, undrawn.len())];

        self.drawn_numbers.push(number);
        self.last_draw_timestamp = now;

        let mut claim_window_closes_at = None;
        if self.all_drawn() {
            let closes_at = now.saturating_add(claim_grace_sec);
            self.status = GameStatus::ClaimWindowOpen;
            self.claim_window_close_timestamp = Some(closes_at);
            claim_window_closes_at = Some(closes_at);
        }

        Ok(DrawOutcome {
            number,
            draw_index,
            claim_window_closes_at,
        })
    }

    /// Validates a bingo claim for `board` and records the win.
    ///
    /// Claims stop once the claim window has elapsed (`ClaimWindowClosed`),
    /// even though the game stays `ClaimWindowOpen` until every winner is
    /// paid. Payouts start at that same instant, so the winner set and each
    /// share are fixed before any funds move.
    pub fn claim_bingo(
        &mut self,
        board: &mut BoardToken,
        caller: &Address,
        policy: ClaimPolicy,
        now: i64,
    ) -> Result<WinLine> {
        if &board.owner != caller {
            return Err(BingoError::NotBoardOwner(board.id));
        }

        if board.game_id != self.id {
            return Err(BingoError::WrongGame {
                token_id: board.id,
                token_game: board.game_id,
            });
        }

        if board.has_won {
            return Err(BingoError::AlreadyClaimed(board.id));
        }

        match self.status {
            GameStatus::Closed => return Err(BingoError::GameClosed(self.id)),
            GameStatus::Drawing if policy == ClaimPolicy::AfterFullDraw => {
                return Err(BingoError::ClaimWindowNotOpen(self.id));
            }
            GameStatus::Drawing => {}
            GameStatus::ClaimWindowOpen => {
                if self.claim_window_elapsed(now) {
                    return Err(BingoError::ClaimWindowClosed(self.id));
                }
            }
        }

        let drawn = DrawnSet::from_numbers(&self.drawn_numbers);
        let line = find_winning_line(&board.layout, &drawn).ok_or(BingoError::NoWinningPattern(board.id))?;

        board.has_won = true;
        self.winner_token_ids.insert(board.id);
        self.winners.insert(board.owner);

        Ok(line)
    }

    pub fn claim_window_elapsed(&self, now: i64) -> bool {
        self.claim_window_close_timestamp
            .map_or(false, |closes_at| now >= closes_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRegistry {
    games: BTreeMap<GameId, Game>,
    next_game_id: GameId,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            games: BTreeMap::new(),
            next_game_id: 1,
        }
    }

    pub fn next_game_id(&self) -> GameId {
        self.next_game_id
    }

    pub fn insert(&mut self, game: Game) -> Result<GameId> {
        if game.id != self.next_game_id {
            return Err(BingoError::activation(format!(
                "expected game id {}, got {}",
                self.next_game_id, game.id
            )));
        }
        let id = game.id;
        self.games.insert(id, game);
        self.next_game_id += 1;
        Ok(id)
    }

    pub fn get(&self, game_id: GameId) -> Option<&Game> {
        self.games.get(&game_id)
    }

    pub fn get_mut(&mut self, game_id: GameId) -> Result<&mut Game> {
        self.games
            .get_mut(&game_id)
            .ok_or(BingoError::UnknownGame(game_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub(crate) fn restore(games: Vec<Game>, next_game_id: GameId) -> Self {
        Self {
            games: games.into_iter().map(|g| (g.id, g)).collect(),
            next_game_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardLayout, FREE};
    use std::collections::HashSet;

    const GRACE: i64 = 120;

    fn alice() -> Address {
        Address::from_low_u64_be(1)
    }

    fn game(interval: u64) -> Game {
        Game {
            id: 1,
            source_proposal_id: 1,
            drawn_numbers: Vec::new(),
            draw_interval_sec: interval,
            last_draw_timestamp: 0,
            status: GameStatus::Drawing,
            claim_window_close_timestamp: None,
            winner_token_ids: BTreeSet::new(),
            winners: BTreeSet::new(),
            players: vec![alice()],
            first_token_id: 0,
            board_count: 1,
            created_at: 0,
        }
    }

    fn board(game_id: GameId) -> BoardToken {
        BoardToken {
            id: 0,
            owner: alice(),
            game_id,
            layout: BoardLayout::from_cells([
                [1, 16, 31, 46, 61],
                [2, 17, 32, 47, 62],
                [3, 18, FREE, 48, 63],
                [4, 19, 34, 49, 64],
                [5, 20, 35, 50, 65],
            ]),
            has_won: false,
        }
    }

    fn draw_all(game: &mut Game) {
        let mut now = 0;
        while game.status == GameStatus::Drawing {
            now += 10;
            game.draw_number(&[1u8; 32], now, GRACE).unwrap();
        }
    }

    #[test]
    fn test_draws_every_number_once() {
        let mut game = game(10);
        draw_all(&mut game);

        assert_eq!(game.drawn_numbers.len(), 75);
        let unique: HashSet<u8> = game.drawn_numbers.iter().copied().collect();
        assert_eq!(unique.len(), 75);
        assert!(unique.iter().all(|n| (1..=75).contains(n)));

        assert_eq!(game.status, GameStatus::ClaimWindowOpen);
        assert_eq!(game.claim_window_close_timestamp, Some(750 + GRACE));
        assert!(matches!(
            game.draw_number(&[1u8; 32], 10_000, GRACE),
            Err(BingoError::GameClosed(1))
        ));
    }

    #[test]
    fn test_draw_sequence_replays_with_fixed_entropy() {
        let mut a = game(0);
        let mut b = game(0);
        for _ in 0..10 {
            a.draw_number(&[5u8; 32], 0, GRACE).unwrap();
            b.draw_number(&[5u8; 32], 0, GRACE).unwrap();
        }
        assert_eq!(a.drawn_numbers, b.drawn_numbers);
    }

    #[test]
    fn test_draw_interval_enforced() {
        let mut game = game(10);
        assert!(matches!(
            game.draw_number(&[1u8; 32], 9, GRACE),
            Err(BingoError::DrawTooEarly { next_draw_at: 10, .. })
        ));
        game.draw_number(&[1u8; 32], 10, GRACE).unwrap();
        assert!(game.draw_number(&[1u8; 32], 15, GRACE).is_err());
        assert_eq!(game.drawn_numbers.len(), 1);
    }

    #[test]
    fn test_claim_requires_pattern() {
        let mut game = game(0);
        let mut board = board(1);

        let err = game
            .claim_bingo(&mut board, &alice(), ClaimPolicy::AnyDrawnState, 0)
            .unwrap_err();
        assert!(matches!(err, BingoError::NoWinningPattern(0)));
        assert!(!board.has_won);
        assert!(game.winners.is_empty());
    }

    #[test]
    fn test_mid_draw_claim_follows_policy() {
        let mut game = game(0);
        game.drawn_numbers = vec![46, 47, 48, 49, 50];
        let mut board = board(1);

        let err = game
            .claim_bingo(&mut board, &alice(), ClaimPolicy::AfterFullDraw, 0)
            .unwrap_err();
        assert!(matches!(err, BingoError::ClaimWindowNotOpen(1)));

        let line = game
            .claim_bingo(&mut board, &alice(), ClaimPolicy::AnyDrawnState, 0)
            .unwrap();
        assert_eq!(line, WinLine::Column(3));
        assert!(board.has_won);
        assert!(game.is_winner(&alice()));
    }

    #[test]
    fn test_claim_rejections() {
        let mut game = game(10);
        draw_all(&mut game);

        let mut stranger_board = board(1);
        stranger_board.owner = Address::from_low_u64_be(9);
        assert!(matches!(
            game.claim_bingo(&mut stranger_board, &alice(), ClaimPolicy::AnyDrawnState, 760),
            Err(BingoError::NotBoardOwner(0))
        ));

        let mut other_game_board = board(2);
        assert!(matches!(
            game.claim_bingo(&mut other_game_board, &alice(), ClaimPolicy::AnyDrawnState, 760),
            Err(BingoError::WrongGame { token_game: 2, .. })
        ));

        let mut board = board(1);
        game.claim_bingo(&mut board, &alice(), ClaimPolicy::AfterFullDraw, 760)
            .unwrap();
        assert!(matches!(
            game.claim_bingo(&mut board, &alice(), ClaimPolicy::AfterFullDraw, 760),
            Err(BingoError::AlreadyClaimed(0))
        ));

        let mut late = board.clone();
        late.has_won = false;
        late.id = 1;
        assert!(matches!(
            game.claim_bingo(&mut late, &alice(), ClaimPolicy::AnyDrawnState, 750 + GRACE),
            Err(BingoError::ClaimWindowClosed(1))
        ));
    }
}
