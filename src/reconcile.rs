//! Client side of online play: merging polled room snapshots into the local,
//! optimistically updated copy of the game

use tracing::{debug, trace};

use crate::board::{Outcome, Player};
use crate::error::MoveError;
use crate::game::{GameState, LastMove, Scores};
use crate::room::{RematchVotes, Room};

/// What the local client is currently showing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// Host waiting for a second player
    Waiting,
    Playing,
    GameOver,
}

/// A finished game from the local seat's point of view
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameResult {
    Won,
    Lost,
    Draw,
}

impl GameResult {
    pub fn for_seat(outcome: Outcome, seat: Player) -> Self {
        match outcome {
            Outcome::Draw => GameResult::Draw,
            Outcome::Win(winner) if winner == seat => GameResult::Won,
            Outcome::Win(_) => GameResult::Lost,
        }
    }
}

/// Changes noticed while reconciling, for the presentation layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    OpponentNamed(String),
    ScoresChanged(Scores),
    OpponentJoined,
    NewGame { game_number: u64, starter: Player },
    MoveApplied(LastMove),
    Finished { outcome: Outcome, result: GameResult },
    RematchVotes(RematchVotes),
    /// A local move the server never recorded was taken back
    LocalMoveDropped(LastMove),
}

/// Local view of one online room
///
/// Each poll response goes through [`Reconciler::reconcile`], which is
/// idempotent: feeding the same snapshot twice yields no events the second
/// time, and snapshots older than the last one adopted from the server (by
/// game number, then move count) are dropped. Optimistic local moves do not
/// count as adopted: if [`Reconciler::UNCONFIRMED_GRACE`] snapshots in a row
/// still lack one, the local game is rolled back to the server's.
#[derive(Clone, Debug)]
pub struct Reconciler {
    seat: Player,
    screen: Screen,
    opponent_name: Option<String>,
    game: GameState,
    game_number: u64,
    scores: Scores,
    last_winner: Option<Player>,
    rematch: RematchVotes,
    failed_polls: u32,
    /// `(game_number, move_count)` of the last adopted snapshot
    confirmed: (u64, usize),
    unconfirmed_polls: u32,
}

impl Reconciler {
    /// Snapshots tolerated behind an optimistic move before it is dropped
    pub const UNCONFIRMED_GRACE: u32 = 3;

    /// For the room's creator, from the room returned by `create`
    pub fn host(room: &Room) -> Self {
        let screen = if room.is_full() {
            Screen::Playing
        } else {
            Screen::Waiting
        };
        Self::adopting(Player::One, room, screen)
    }

    /// For the second player, from the room returned by `join`
    pub fn guest(room: &Room) -> Self {
        Self::adopting(Player::Two, room, Screen::Playing)
    }

    fn adopting(seat: Player, room: &Room, screen: Screen) -> Self {
        let mut reconciler = Self {
            seat,
            screen,
            opponent_name: room.name_of(seat.other()).map(str::to_string),
            game: room.game.clone(),
            game_number: room.game_number,
            scores: room.scores,
            last_winner: room.last_winner,
            rematch: room.rematch_votes,
            failed_polls: 0,
            confirmed: room.progress(),
            unconfirmed_polls: 0,
        };
        if reconciler.game.is_over() {
            reconciler.screen = Screen::GameOver;
        }
        reconciler
    }

    pub fn seat(&self) -> Player {
        self.seat
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn opponent_name(&self) -> Option<&str> {
        self.opponent_name.as_deref()
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn game_number(&self) -> u64 {
        self.game_number
    }

    pub fn scores(&self) -> Scores {
        self.scores
    }

    pub fn last_winner(&self) -> Option<Player> {
        self.last_winner
    }

    pub fn rematch_votes(&self) -> RematchVotes {
        self.rematch
    }

    pub fn rematch_requested(&self) -> bool {
        self.rematch.has_voted(self.seat)
    }

    /// Consecutive failed polls since the last successful one
    pub fn failed_polls(&self) -> u32 {
        self.failed_polls
    }

    pub fn is_my_turn(&self) -> bool {
        self.screen == Screen::Playing
            && !self.game.is_over()
            && self.game.current_player == self.seat
    }

    /// Applies the local player's drop before the server has confirmed it
    pub fn play_local(&mut self, column: usize) -> Result<Option<Outcome>, MoveError> {
        if self.screen == Screen::Waiting {
            return Err(MoveError::NotYourTurn);
        }
        let outcome = self.game.apply_move(self.seat, column)?;
        if let Some(outcome) = outcome {
            if let Outcome::Win(winner) = outcome {
                self.last_winner = Some(winner);
            }
            self.screen = Screen::GameOver;
        }
        Ok(outcome)
    }

    /// Counts a poll that produced no snapshot; the next interval simply retries
    pub fn poll_failed(&mut self) {
        self.failed_polls += 1;
        trace!(failed = self.failed_polls, "poll failed");
    }

    /// Merges an authoritative snapshot into the local state
    pub fn reconcile(&mut self, room: &Room) -> Vec<SyncEvent> {
        self.failed_polls = 0;
        if room.progress() < self.confirmed {
            trace!(remote = ?room.progress(), confirmed = ?self.confirmed, "dropping stale snapshot");
            return Vec::new();
        }
        self.confirmed = room.progress();

        let mut events = Vec::new();

        if self.opponent_name.is_none() {
            if let Some(name) = room.name_of(self.seat.other()) {
                self.opponent_name = Some(name.to_string());
                events.push(SyncEvent::OpponentNamed(name.to_string()));
            }
        }

        // scores are only ever taken from the server
        if room.scores != self.scores {
            self.scores = room.scores;
            events.push(SyncEvent::ScoresChanged(room.scores));
        }

        if self.screen == Screen::Waiting && room.is_full() {
            self.screen = Screen::Playing;
            events.push(SyncEvent::OpponentJoined);
        }

        // checked before the move delta: a new game restarts the move count
        if room.game_number > self.game_number {
            let starter = room.last_winner.unwrap_or(Player::One);
            self.game = GameState::new(starter);
            self.game_number = room.game_number;
            self.rematch = RematchVotes::default();
            self.screen = Screen::Playing;
            events.push(SyncEvent::NewGame {
                game_number: room.game_number,
                starter,
            });
        }

        if room.game.move_count > self.game.move_count {
            self.game.board = room.game.board;
            self.game.current_player = room.game.current_player;
            self.game.move_count = room.game.move_count;
            self.game.last_move = room.game.last_move;
            if let Some(last_move) = room.game.last_move {
                events.push(SyncEvent::MoveApplied(last_move));
            }
            self.unconfirmed_polls = 0;
        } else if room.game.move_count < self.game.move_count {
            self.unconfirmed_polls += 1;
            if self.unconfirmed_polls < Self::UNCONFIRMED_GRACE {
                trace!(polls = self.unconfirmed_polls, "local move not on the server yet");
            } else {
                debug!(
                    local = self.game.move_count,
                    remote = room.game.move_count,
                    "rolling back unconfirmed local move"
                );
                let dropped = self.game.last_move;
                self.game = room.game.clone();
                self.last_winner = room.last_winner;
                self.screen = if self.game.is_over() {
                    Screen::GameOver
                } else {
                    Screen::Playing
                };
                self.unconfirmed_polls = 0;
                if let Some(dropped) = dropped {
                    events.push(SyncEvent::LocalMoveDropped(dropped));
                }
            }
        } else {
            self.unconfirmed_polls = 0;
        }

        if let Some(outcome) = room.game.winner {
            if self.game.winner.is_none() {
                self.game.winner = Some(outcome);
                self.game.win_cells = room.game.win_cells.clone();
                if let Some(winner) = outcome.winner() {
                    self.last_winner = Some(winner);
                }
                self.screen = Screen::GameOver;
                events.push(SyncEvent::Finished {
                    outcome,
                    result: GameResult::for_seat(outcome, self.seat),
                });
            }
        }

        if room.rematch_votes != self.rematch {
            self.rematch = room.rematch_votes;
            events.push(SyncEvent::RematchVotes(room.rematch_votes));
        }

        events
    }

    /// Overwrites the local state with `room`, ignoring ordering.
    ///
    /// Used after the server rejected an optimistic local move.
    pub fn resync(&mut self, room: &Room) {
        let opponent_name = self
            .opponent_name
            .take()
            .or_else(|| room.name_of(self.seat.other()).map(str::to_string));
        let screen = if room.game.is_over() {
            Screen::GameOver
        } else if room.is_full() {
            Screen::Playing
        } else {
            Screen::Waiting
        };
        *self = Self {
            seat: self.seat,
            screen,
            opponent_name,
            game: room.game.clone(),
            game_number: room.game_number,
            scores: room.scores,
            last_winner: room.last_winner,
            rematch: room.rematch_votes,
            failed_polls: 0,
            confirmed: room.progress(),
            unconfirmed_polls: 0,
        };
    }
}
