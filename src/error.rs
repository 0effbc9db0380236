use std::path::PathBuf;

/// Reasons a drop cannot be applied to a game in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("game over")]
    GameOver,

    #[error("not your turn")]
    NotYourTurn,

    #[error("column {0} is full")]
    ColumnFull(usize),

    #[error("column {0} is out of range")]
    InvalidColumn(usize),
}

/// Reasons a room code is rejected before lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("room code must be {expected} chars, got {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("invalid character '{ch}' at position {index}")]
    InvalidCharacter { ch: char, index: usize },
}

/// Failures of the room persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room store lock poisoned")]
    Poisoned,
}

/// Errors returned by room requests.
///
/// Every variant is terminal for the request that produced it, and no
/// partial mutation is persisted.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(String),

    #[error("room {0} is full")]
    RoomFull(String),

    #[error("game over")]
    GameOver,

    #[error("not your turn")]
    Forbidden,

    #[error("column {0} is full")]
    ColumnFull(usize),

    #[error("column {0} is out of range")]
    InvalidColumn(usize),

    #[error("invalid room code: {0}")]
    InvalidCode(#[from] CodeError),

    #[error("room {code} kept changing, gave up after {attempts} attempts")]
    Conflict { code: String, attempts: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<MoveError> for RoomError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::GameOver => RoomError::GameOver,
            MoveError::NotYourTurn => RoomError::Forbidden,
            MoveError::ColumnFull(column) => RoomError::ColumnFull(column),
            MoveError::InvalidColumn(column) => RoomError::InvalidColumn(column),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}
