//! The shared 6x7 grid, drop rules and four-in-a-row detection

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::{HEIGHT, WIDTH};

/// Number of moves that fill the board
pub const MAX_MOVES: usize = WIDTH * HEIGHT;

/// A board coordinate as `(row, column)`, row 0 being the top row
pub type Coord = (usize, usize);

/// The four cells of a completed alignment
pub type WinLine = [Coord; 4];

/// One of the two seats in a game
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    pub fn cell(self) -> Cell {
        match self {
            Player::One => Cell::PlayerOne,
            Player::Two => Cell::PlayerTwo,
        }
    }

    /// The 1-based seat number
    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }
}

impl From<Player> for u8 {
    fn from(player: Player) -> u8 {
        player.number()
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(format!("invalid player number {}", other)),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.number())
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Cell {
    Empty,
    PlayerOne,
    PlayerTwo,
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn player(&self) -> Option<Player> {
        match self {
            Cell::Empty => None,
            Cell::PlayerOne => Some(Player::One),
            Cell::PlayerTwo => Some(Player::Two),
        }
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> u8 {
        match cell {
            Cell::Empty => 0,
            Cell::PlayerOne => 1,
            Cell::PlayerTwo => 2,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::PlayerOne),
            2 => Ok(Cell::PlayerTwo),
            other => Err(format!("invalid cell value {}", other)),
        }
    }
}

/// How a finished game ended
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Outcome {
    Win(Player),
    Draw,
}

impl Outcome {
    pub fn winner(&self) -> Option<Player> {
        match self {
            Outcome::Win(player) => Some(*player),
            Outcome::Draw => None,
        }
    }
}

impl From<Outcome> for i8 {
    fn from(outcome: Outcome) -> i8 {
        match outcome {
            Outcome::Win(player) => player.number() as i8,
            Outcome::Draw => -1,
        }
    }
}

impl TryFrom<i8> for Outcome {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Outcome::Draw),
            1 => Ok(Outcome::Win(Player::One)),
            2 => Ok(Outcome::Win(Player::Two)),
            other => Err(format!("invalid outcome {}", other)),
        }
    }
}

// line directions as (row step, column step): horizontal, vertical and both diagonals
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// A 6x7 Connect 4 grid
///
/// Rows are stored top-to-bottom, so pieces settle towards row `HEIGHT - 1`.
/// Every column is filled contiguously from the bottom because the only
/// mutation is [`Board::drop_piece`]/[`Board::place`] at the row given by
/// [`Board::drop_row`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; WIDTH]; HEIGHT],
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; WIDTH]; HEIGHT],
        }
    }

    /// Builds a position from a string of 1-indexed column digits, alternating
    /// players starting with player one
    pub fn from_moves<S: AsRef<str>>(moves: S) -> Result<Self> {
        let mut board = Self::new();
        let mut player = Player::One;
        let mut finished = false;

        for column_char in moves.as_ref().chars() {
            match column_char.to_digit(10).map(|c| c as usize) {
                Some(column @ 1..=WIDTH) => {
                    // abort if the position is won at any point
                    if finished {
                        return Err(anyhow!("Invalid position, game is over"));
                    }
                    let column = column - 1;
                    let row = board
                        .drop_row(column)
                        .ok_or_else(|| anyhow!("Invalid move, column {} full", column + 1))?;
                    board.place(row, column, player);
                    finished = board.check_win(row, column).is_some();
                    player = player.other();
                }
                _ => return Err(anyhow!("could not parse '{}' as a valid move", column_char)),
            }
        }
        Ok(board)
    }

    pub fn get(&self, row: usize, column: usize) -> Cell {
        self.cells[row][column]
    }

    /// The row a piece dropped in `column` lands on, or `None` when the column is full.
    ///
    /// `column` must be below `WIDTH`.
    pub fn drop_row(&self, column: usize) -> Option<usize> {
        (0..HEIGHT).rev().find(|&row| self.cells[row][column].is_empty())
    }

    pub fn playable(&self, column: usize) -> bool {
        self.cells[0][column].is_empty()
    }

    /// Puts a piece at a position previously returned by [`Board::drop_row`]
    pub fn place(&mut self, row: usize, column: usize, player: Player) {
        debug_assert_eq!(self.drop_row(column), Some(row));
        self.cells[row][column] = player.cell();
    }

    /// Drops a piece, returning the row it landed on
    pub fn drop_piece(&mut self, column: usize, player: Player) -> Option<usize> {
        let row = self.drop_row(column)?;
        self.cells[row][column] = player.cell();
        Some(row)
    }

    /// Looks for a four-in-a-row through the piece at `(row, column)`.
    ///
    /// Only lines through that cell are inspected, so this has to be called
    /// straight after the piece was placed. Each direction is extended up to
    /// three cells forwards and then backwards while the colour matches; the
    /// first four cells collected for the first complete direction are returned.
    pub fn check_win(&self, row: usize, column: usize) -> Option<WinLine> {
        let player = self.cells[row][column];
        if player.is_empty() {
            return None;
        }

        for &(dr, dc) in DIRECTIONS.iter() {
            let mut line = [(row, column); 4];
            let mut len = 1;
            for &sign in [1isize, -1].iter() {
                for step in 1..4isize {
                    let r = row as isize + dr * step * sign;
                    let c = column as isize + dc * step * sign;
                    if r < 0
                        || r >= HEIGHT as isize
                        || c < 0
                        || c >= WIDTH as isize
                        || self.cells[r as usize][c as usize] != player
                    {
                        break;
                    }
                    if len < 4 {
                        line[len] = (r as usize, c as usize);
                    }
                    len += 1;
                }
            }
            if len >= 4 {
                return Some(line);
            }
        }
        None
    }

    /// Full-board scan for any four-in-a-row, used where the last placed
    /// piece is unknown
    pub fn is_won(&self) -> bool {
        (0..HEIGHT).any(|row| (0..WIDTH).any(|column| self.check_win(row, column).is_some()))
    }

    pub fn num_pieces(&self) -> usize {
        self.cells
            .iter()
            .flat_map(|row| row.iter())
            .filter(|cell| !cell.is_empty())
            .count()
    }

    pub fn is_full(&self) -> bool {
        (0..WIDTH).all(|column| !self.playable(column))
    }

    /// Iterates rows top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[Cell; WIDTH]> {
        self.cells.iter()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        for row in self.cells.iter() {
            for cell in row.iter() {
                let symbol = match cell {
                    Cell::Empty => '.',
                    Cell::PlayerOne => 'X',
                    Cell::PlayerTwo => 'O',
                };
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
