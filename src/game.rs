//! Progress of a single game: whose turn it is, how many moves were made and
//! how it ended

use serde::{Deserialize, Serialize};

use crate::board::{Board, Coord, Outcome, Player, MAX_MOVES};
use crate::error::MoveError;
use crate::WIDTH;

/// The most recently applied drop
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMove {
    pub row: usize,
    pub col: usize,
    pub player: Player,
}

/// Cumulative results over the games played by the same two seats
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub p1: u32,
    pub p2: u32,
    pub draws: u32,
}

impl Scores {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Win(Player::One) => self.p1 += 1,
            Outcome::Win(Player::Two) => self.p2 += 1,
            Outcome::Draw => self.draws += 1,
        }
    }

    pub fn games(&self) -> u32 {
        self.p1 + self.p2 + self.draws
    }

    /// True when no count in `self` is below the matching count in `earlier`
    pub fn dominates(&self, earlier: &Scores) -> bool {
        self.p1 >= earlier.p1 && self.p2 >= earlier.p2 && self.draws >= earlier.draws
    }
}

/// Board plus turn bookkeeping for one game
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub board: Board,
    pub current_player: Player,
    pub move_count: usize,
    pub winner: Option<Outcome>,
    pub win_cells: Vec<Coord>,
    pub last_move: Option<LastMove>,
}

impl GameState {
    pub fn new(starter: Player) -> Self {
        Self {
            board: Board::new(),
            current_player: starter,
            move_count: 0,
            winner: None,
            win_cells: Vec::new(),
            last_move: None,
        }
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Drops a piece for `player` and settles the result.
    ///
    /// The turn is checked against this state, so a caller holding a stale
    /// copy cannot sneak a move in out of order. Returns the outcome when the
    /// move finished the game.
    pub fn apply_move(&mut self, player: Player, column: usize) -> Result<Option<Outcome>, MoveError> {
        if self.winner.is_some() {
            return Err(MoveError::GameOver);
        }
        if player != self.current_player {
            return Err(MoveError::NotYourTurn);
        }
        if column >= WIDTH {
            return Err(MoveError::InvalidColumn(column));
        }
        let row = self
            .board
            .drop_row(column)
            .ok_or(MoveError::ColumnFull(column))?;

        self.board.place(row, column, player);
        self.move_count += 1;
        self.last_move = Some(LastMove {
            row,
            col: column,
            player,
        });
        self.current_player = player.other();

        if let Some(line) = self.board.check_win(row, column) {
            self.winner = Some(Outcome::Win(player));
            self.win_cells = line.to_vec();
        } else if self.move_count >= MAX_MOVES {
            self.winner = Some(Outcome::Draw);
        }
        Ok(self.winner)
    }
}
