//! Running the search away from the interactive thread
//!
//! Two interchangeable strategies sit behind [`MoveSource`]: searching inline
//! on the caller's thread, or on a background thread guarded by a watchdog.
//! Both use the same [`SearchConfig`] depth and deadline limits.

use tracing::{debug, warn};

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::board::{Board, Player};
use crate::search::{Difficulty, SearchConfig, Searcher};

/// Something that can pick the computer's next column
pub trait MoveSource {
    /// Returns a legal column, or `None` when the board is full
    fn choose_move(&mut self, board: &Board, difficulty: Difficulty, ai: Player) -> Option<usize>;
}

/// Searches synchronously on the calling thread
pub struct InlineSearch {
    searcher: Searcher,
}

impl InlineSearch {
    pub fn new(searcher: Searcher) -> Self {
        Self { searcher }
    }
}

impl MoveSource for InlineSearch {
    fn choose_move(&mut self, board: &Board, difficulty: Difficulty, ai: Player) -> Option<usize> {
        self.searcher.choose_move(board, difficulty, ai)
    }
}

/// Searches on a dedicated thread, falling back to an inline search when the
/// thread cannot be started or stays silent past the watchdog
pub struct BackgroundSearch {
    config: SearchConfig,
    fallback: Searcher,
}

impl BackgroundSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            fallback: Searcher::new(config.clone()),
            config,
        }
    }

    /// Starts a search for `board` and returns immediately
    pub fn spawn(&self, board: Board, difficulty: Difficulty, ai: Player) -> PendingMove {
        let (tx, rx) = channel();
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name("c4-search".to_string())
            .spawn(move || {
                let mut searcher = Searcher::new(config);
                let column = searcher.choose_move(&board, difficulty, ai);
                // the receiver may have given up on us already
                let _ = tx.send(column);
            });

        let receiver = match spawned {
            Ok(_) => Some(rx),
            Err(err) => {
                warn!(%err, "could not start search thread, searching inline");
                None
            }
        };

        PendingMove {
            board,
            difficulty,
            ai,
            receiver,
            watchdog: self.config.watchdog(),
        }
    }
}

impl MoveSource for BackgroundSearch {
    fn choose_move(&mut self, board: &Board, difficulty: Difficulty, ai: Player) -> Option<usize> {
        let pending = self.spawn(*board, difficulty, ai);
        match pending.finish(board, &mut self.fallback) {
            Resolution::Ready(column) => column,
            // same position by construction
            Resolution::Stale => None,
        }
    }
}

/// Result of waiting on a [`PendingMove`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The chosen column (`None` on a full board)
    Ready(Option<usize>),
    /// The game moved on while the search ran; the result must not be applied
    Stale,
}

/// A search in flight for one specific position
pub struct PendingMove {
    board: Board,
    difficulty: Difficulty,
    ai: Player,
    receiver: Option<Receiver<Option<usize>>>,
    watchdog: Duration,
}

impl PendingMove {
    /// The position this search was started for
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Waits for the result, to be applied on `current`.
    ///
    /// Returns [`Resolution::Stale`] if `current` is no longer the position the
    /// search started from. When the background thread is missing, hangs past
    /// the watchdog or dies, `fallback` searches the position inline instead.
    pub fn finish(self, current: &Board, fallback: &mut Searcher) -> Resolution {
        if current != &self.board {
            debug!("discarding search for a stale position");
            return Resolution::Stale;
        }

        let column = match &self.receiver {
            Some(rx) => match rx.recv_timeout(self.watchdog) {
                Ok(column) => column,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(watchdog = ?self.watchdog, "search thread silent, searching inline");
                    fallback.choose_move(&self.board, self.difficulty, self.ai)
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("search thread died, searching inline");
                    fallback.choose_move(&self.board, self.difficulty, self.ai)
                }
            },
            None => fallback.choose_move(&self.board, self.difficulty, self.ai),
        };
        Resolution::Ready(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_results_are_discarded() {
        let background = BackgroundSearch::new(SearchConfig::default());
        let board = Board::from_moves("44").unwrap();
        let pending = background.spawn(board, Difficulty::Medium, Player::Two);

        let mut moved_on = board;
        moved_on.drop_piece(0, Player::One);
        let mut fallback = Searcher::default();
        assert_eq!(pending.finish(&moved_on, &mut fallback), Resolution::Stale);
    }

    #[test]
    fn silent_worker_falls_back_to_inline_search() {
        let (_tx, rx) = channel::<Option<usize>>();
        // a worker that never answers
        let board = Board::from_moves("45454").unwrap();
        let pending = PendingMove {
            board,
            difficulty: Difficulty::Hard,
            ai: Player::Two,
            receiver: Some(rx),
            watchdog: Duration::from_millis(10),
        };
        let mut fallback = Searcher::default();
        // player one threatens a vertical four in column 4
        assert_eq!(
            pending.finish(&board, &mut fallback),
            Resolution::Ready(Some(3))
        );
    }

    #[test]
    fn background_search_returns_a_legal_column() {
        let mut background = BackgroundSearch::new(SearchConfig::default());
        let board = Board::from_moves("4455").unwrap();
        let column = background
            .choose_move(&board, Difficulty::Medium, Player::One)
            .unwrap();
        assert!(board.playable(column));
    }
}
