//! Server side of online play: the request handlers that own each room's
//! authoritative state

use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use std::sync::Mutex;
use std::time::Duration;

use crate::board::{Outcome, Player};
use crate::error::{RoomError, StoreError};
use crate::room::{display_name, PlayerId, RematchVotes, Room, RoomCode};
use crate::store::RoomStore;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Inactivity lifetime of a room; every write restarts it
    pub ttl_secs: u64,
    /// Namespace prepended to room codes to form store keys
    pub key_prefix: String,
    /// Fresh codes tried before accepting a collision
    pub code_attempts: usize,
    /// Read-modify-write rounds before a request gives up on a busy room
    pub write_attempts: usize,
}

impl RoomConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 4 * 60 * 60,
            key_prefix: "c4:".to_string(),
            code_attempts: 10,
            write_attempts: 5,
        }
    }
}

/// Request handlers for online rooms, backed by a [`RoomStore`]
pub struct RoomService<S> {
    store: S,
    config: RoomConfig,
    rng: Mutex<StdRng>,
}

impl<S: RoomStore> RoomService<S> {
    pub fn new(store: S, config: RoomConfig) -> Self {
        Self {
            store,
            config,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Creates a service whose room codes are reproducible
    pub fn with_seed(store: S, config: RoomConfig, seed: u64) -> Self {
        Self {
            store,
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    fn key(&self, code: &RoomCode) -> String {
        format!("{}{}", self.config.key_prefix, code)
    }

    fn next_code(&self) -> Result<RoomCode, RoomError> {
        let mut rng = self.rng.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(RoomCode::generate(&mut *rng))
    }

    /// Opens a new room with `player` in the first seat
    pub fn create(&self, player: &PlayerId, name: Option<&str>) -> Result<Room, RoomError> {
        let name = display_name(name, Player::One);
        let ttl = self.config.ttl();

        for attempt in 1..self.config.code_attempts.max(1) {
            let code = self.next_code()?;
            let room = Room::new(code.clone(), player.clone(), name.clone());
            if self.store.compare_and_set(&self.key(&code), None, &room, ttl)? {
                info!(%code, player = %player, "room created");
                return Ok(room);
            }
            debug!(%code, attempt, "room code collision");
        }

        // out of fresh codes, take the collision
        let code = self.next_code()?;
        let room = Room::new(code.clone(), player.clone(), name);
        warn!(%code, "room code retries exhausted, overwriting");
        self.store.set(&self.key(&code), &room, ttl)?;
        Ok(room)
    }

    /// Takes the second seat of `code`
    pub fn join(&self, code: &str, player: &PlayerId, name: Option<&str>) -> Result<Room, RoomError> {
        let code = RoomCode::parse(code)?;
        let room = self.update(&code, |room| {
            if &room.player1 == player {
                // the host reopening their own room
                return Ok(());
            }
            match &room.player2 {
                Some(existing) if existing != player => {
                    return Err(RoomError::RoomFull(room.room_code.to_string()));
                }
                _ => {}
            }
            room.player2 = Some(player.clone());
            room.player2_name = Some(display_name(name, Player::Two));
            Ok(())
        })?;
        info!(%code, player = %player, "player joined");
        Ok(room)
    }

    /// Drops a piece for the seat held by `player`.
    ///
    /// The seat and turn are validated against the exact room version being
    /// replaced, so a move racing another write is re-checked after a reload.
    pub fn make_move(&self, code: &str, player: &PlayerId, column: usize) -> Result<Room, RoomError> {
        let code = RoomCode::parse(code)?;
        let room = self.update(&code, |room| {
            if room.game.is_over() {
                return Err(RoomError::GameOver);
            }
            let seat = room.seat_of(player).ok_or(RoomError::Forbidden)?;
            if let Some(outcome) = room.game.apply_move(seat, column)? {
                if let Outcome::Win(winner) = outcome {
                    room.last_winner = Some(winner);
                }
                room.scores.record(outcome);
            }
            room.rematch_votes = RematchVotes::default();
            Ok(())
        })?;

        debug!(%code, column, moves = room.game.move_count, "move applied");
        if let Some(outcome) = room.game.winner {
            info!(%code, ?outcome, game = room.game_number, "game finished");
        }
        Ok(room)
    }

    /// Records `player`'s wish to play again; once both seats agree a new game starts
    pub fn rematch(&self, code: &str, player: &PlayerId) -> Result<Room, RoomError> {
        let code = RoomCode::parse(code)?;
        let room = self.update(&code, |room| {
            let seat = room.seat_of(player).ok_or(RoomError::Forbidden)?;
            room.rematch_votes.vote(seat);
            if room.rematch_votes.agreed() {
                room.start_next_game();
            }
            Ok(())
        })?;

        // a vote always leaves one flag set unless it started the next game
        if room.rematch_votes == RematchVotes::default() {
            info!(%code, game = room.game_number, starter = %room.game.current_player, "rematch started");
        }
        Ok(room)
    }

    /// Current snapshot of `code`
    pub fn read(&self, code: &str) -> Result<Room, RoomError> {
        let code = RoomCode::parse(code)?;
        self.load(&code)
    }

    fn load(&self, code: &RoomCode) -> Result<Room, RoomError> {
        self.store
            .get(&self.key(code))?
            .ok_or_else(|| RoomError::NotFound(code.to_string()))
    }

    /// Read-modify-write of one room.
    ///
    /// `mutate` runs on a copy; nothing is written when it fails. The write is
    /// conditional on the version read, and a lost race reloads and re-runs
    /// `mutate` against the newer state.
    fn update<F>(&self, code: &RoomCode, mut mutate: F) -> Result<Room, RoomError>
    where
        F: FnMut(&mut Room) -> Result<(), RoomError>,
    {
        let key = self.key(code);
        let attempts = self.config.write_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.load(code)?;
            let mut next = current.clone();
            mutate(&mut next)?;
            next.version = current.version + 1;

            if self
                .store
                .compare_and_set(&key, Some(current.version), &next, self.config.ttl())?
            {
                return Ok(next);
            }
            warn!(%code, attempt, "room changed during update, retrying");
        }
        Err(RoomError::Conflict {
            code: code.to_string(),
            attempts,
        })
    }
}
