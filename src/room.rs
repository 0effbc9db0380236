//! The authoritative online room and its identifiers

use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::board::{Outcome, Player};
use crate::error::CodeError;
use crate::game::{GameState, Scores};

pub const ROOM_CODE_LEN: usize = 4;

/// Upper-case letters and digits without the easily confused `0 O 1 I`
pub const ROOM_CODE_ALPHABET: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const PLAYER_ID_LEN: usize = 8;
const PLAYER_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Longest display name kept, in characters
pub const MAX_NAME_LEN: usize = 12;

/// Four character room code, always stored in upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Parses user input, ignoring surrounding whitespace and case
    pub fn parse(value: &str) -> Result<Self, CodeError> {
        let value = value.trim().to_uppercase();
        let found = value.chars().count();
        if found != ROOM_CODE_LEN {
            return Err(CodeError::InvalidLength {
                expected: ROOM_CODE_LEN,
                found,
            });
        }
        for (index, ch) in value.chars().enumerate() {
            if !ROOM_CODE_ALPHABET.contains(ch) {
                return Err(CodeError::InvalidCharacter { ch, index });
            }
        }
        Ok(Self(value))
    }

    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let alphabet = ROOM_CODE_ALPHABET.as_bytes();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomCode {
    type Err = CodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> String {
        code.0
    }
}

/// Opaque client identity; seats are matched on this, never on names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// A random 8 character base-36 token
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id = (0..PLAYER_ID_LEN)
            .map(|_| PLAYER_ID_ALPHABET[rng.gen_range(0..PLAYER_ID_ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Cleans up a requested display name, falling back to the seat's default
pub fn display_name(requested: Option<&str>, seat: Player) -> String {
    let trimmed = requested.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        format!("PLAYER {}", seat.number())
    } else {
        trimmed.chars().take(MAX_NAME_LEN).collect()
    }
}

/// Rematch intent of both seats
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RematchVotes {
    pub p1: bool,
    pub p2: bool,
}

impl RematchVotes {
    pub fn vote(&mut self, seat: Player) {
        match seat {
            Player::One => self.p1 = true,
            Player::Two => self.p2 = true,
        }
    }

    pub fn has_voted(&self, seat: Player) -> bool {
        match seat {
            Player::One => self.p1,
            Player::Two => self.p2,
        }
    }

    pub fn agreed(&self) -> bool {
        self.p1 && self.p2
    }
}

/// One online room as persisted in the store
///
/// The current game's fields are flattened into the room so the wire shape is
/// a single object (`roomCode`, `board`, `currentPlayer`, `moveCount`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_code: RoomCode,
    #[serde(flatten)]
    pub game: GameState,
    pub player1: PlayerId,
    pub player1_name: String,
    pub player2: Option<PlayerId>,
    pub player2_name: Option<String>,
    #[serde(rename = "rematch")]
    pub rematch_votes: RematchVotes,
    pub game_number: u64,
    pub scores: Scores,
    pub last_winner: Option<Player>,
    /// Bumped on every write, compared by the store before replacing a room
    pub version: u64,
}

impl Room {
    /// A fresh room with `host` in the first seat
    pub fn new(room_code: RoomCode, host: PlayerId, host_name: String) -> Self {
        Self {
            room_code,
            game: GameState::new(Player::One),
            player1: host,
            player1_name: host_name,
            player2: None,
            player2_name: None,
            rematch_votes: RematchVotes::default(),
            game_number: 0,
            scores: Scores::default(),
            last_winner: None,
            version: 0,
        }
    }

    /// The seat held by `player`, if any
    pub fn seat_of(&self, player: &PlayerId) -> Option<Player> {
        if &self.player1 == player {
            Some(Player::One)
        } else if self.player2.as_ref() == Some(player) {
            Some(Player::Two)
        } else {
            None
        }
    }

    pub fn name_of(&self, seat: Player) -> Option<&str> {
        match seat {
            Player::One => Some(self.player1_name.as_str()),
            Player::Two => self.player2_name.as_deref(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.player2.is_some()
    }

    pub fn winner(&self) -> Option<Outcome> {
        self.game.winner
    }

    /// Ordering key of the observable state: later games first, then later moves
    pub fn progress(&self) -> (u64, usize) {
        (self.game_number, self.game.move_count)
    }

    /// Replaces the finished game with a new one opened by the last winner
    pub(crate) fn start_next_game(&mut self) {
        let starter = self.last_winner.unwrap_or(Player::One);
        self.game = GameState::new(starter);
        self.rematch_votes = RematchVotes::default();
        self.game_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn codes_are_canonicalised() {
        let code = RoomCode::parse(" abcd ").unwrap();
        assert_eq!(code.as_str(), "ABCD");
        assert_eq!(
            RoomCode::parse("AB"),
            Err(CodeError::InvalidLength {
                expected: 4,
                found: 2
            })
        );
        assert_eq!(
            RoomCode::parse("AB0D"),
            Err(CodeError::InvalidCharacter { ch: '0', index: 2 })
        );
    }

    #[test]
    fn generated_codes_parse() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = RoomCode::generate(&mut rng);
            assert_eq!(RoomCode::parse(code.as_str()), Ok(code));
        }
    }

    #[test]
    fn player_ids_are_base36() {
        let mut rng = StdRng::seed_from_u64(1);
        let id = PlayerId::generate(&mut rng);
        assert_eq!(id.as_str().len(), 8);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn display_names_are_trimmed_and_defaulted() {
        assert_eq!(display_name(None, Player::One), "PLAYER 1");
        assert_eq!(display_name(Some("   "), Player::Two), "PLAYER 2");
        assert_eq!(
            display_name(Some("  a very long name indeed "), Player::One),
            "a very long "
        );
    }

    #[test]
    fn room_round_trips_through_json_with_wire_names() {
        let mut room = Room::new(
            RoomCode::parse("WXYZ").unwrap(),
            PlayerId::new("host"),
            "ANN".to_string(),
        );
        room.game.apply_move(Player::One, 3).unwrap();
        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["roomCode"], "WXYZ");
        assert_eq!(json["moveCount"], 1);
        assert_eq!(json["currentPlayer"], 2);
        assert_eq!(json["rematch"]["p1"], false);
        assert_eq!(json["lastMove"]["col"], 3);
        assert!(json["winner"].is_null());

        let back: Room = serde_json::from_value(json).unwrap();
        assert_eq!(back, room);
    }
}
