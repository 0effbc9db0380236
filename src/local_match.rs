//! A series of games between a local player and the computer

use tracing::{debug, info};

use crate::board::{Outcome, Player};
use crate::error::MoveError;
use crate::game::{GameState, Scores};
use crate::search::Difficulty;
use crate::worker::MoveSource;

/// The human always holds the first seat; the computer plays the second.
#[derive(Clone, Debug)]
pub struct LocalMatch {
    difficulty: Difficulty,
    game: GameState,
    scores: Scores,
    last_winner: Option<Player>,
}

impl LocalMatch {
    pub const HUMAN: Player = Player::One;
    pub const COMPUTER: Player = Player::Two;

    /// Starts a fresh scoreboard with the human to move
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            game: GameState::new(Self::HUMAN),
            scores: Scores::default(),
            last_winner: None,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn last_winner(&self) -> Option<Player> {
        self.last_winner
    }

    pub fn is_computer_turn(&self) -> bool {
        !self.game.is_over() && self.game.current_player == Self::COMPUTER
    }

    /// Drops a piece for the human
    pub fn play(&mut self, column: usize) -> Result<Option<Outcome>, MoveError> {
        self.apply(Self::HUMAN, column)
    }

    /// Asks `source` for the computer's column and plays it.
    ///
    /// Returns the column played, or `None` if it was not the computer's turn.
    pub fn play_computer(
        &mut self,
        source: &mut dyn MoveSource,
    ) -> Result<Option<usize>, MoveError> {
        if !self.is_computer_turn() {
            return Ok(None);
        }
        let column = match source.choose_move(&self.game.board, self.difficulty, Self::COMPUTER) {
            Some(column) => column,
            None => return Ok(None),
        };
        self.apply(Self::COMPUTER, column)?;
        debug!(column, difficulty = %self.difficulty, "computer moved");
        Ok(Some(column))
    }

    fn apply(&mut self, player: Player, column: usize) -> Result<Option<Outcome>, MoveError> {
        let outcome = self.game.apply_move(player, column)?;
        if let Some(outcome) = outcome {
            if let Outcome::Win(winner) = outcome {
                self.last_winner = Some(winner);
            }
            self.scores.record(outcome);
            info!(?outcome, scores = ?self.scores, "local game finished");
        }
        Ok(outcome)
    }

    /// Next game against the same opponent; the last winner opens
    pub fn rematch(&mut self) {
        let starter = self.last_winner.unwrap_or(Self::HUMAN);
        self.game = GameState::new(starter);
    }

    /// Switches tier mid-series, keeping the scoreboard; the last winner opens
    pub fn change_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.game = GameState::new(self.last_winner.unwrap_or(Self::HUMAN));
    }
}
