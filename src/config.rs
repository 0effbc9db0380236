use std::path::Path;

use tracing::warn;

use crate::error::ConfigError;
use crate::poller::PollConfig;
use crate::search::{Difficulty, SearchConfig};
use crate::session::RoomConfig;

/// Top-level application configuration, loadable from TOML.
///
/// ```toml
/// [search]
/// watchdog_ms = 800
/// hard = { depth = 6, budget_ms = 250 }
///
/// [room]
/// ttl_secs = 14400
///
/// [poll]
/// interval_ms = 700
/// ```
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub room: RoomConfig,
    pub poll: PollConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for difficulty in Difficulty::ALL.iter() {
            let limits = self.search.limits(*difficulty);
            if limits.depth == 0 {
                return Err(ConfigError::Validation(format!(
                    "search.{}.depth must be > 0",
                    difficulty
                )));
            }
            if limits.budget_ms == 0 {
                return Err(ConfigError::Validation(format!(
                    "search.{}.budget_ms must be > 0",
                    difficulty
                )));
            }
        }
        let p = self.search.easy_search_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::Validation(
                "search.easy_search_probability must be in [0, 1]".into(),
            ));
        }
        if self.search.watchdog_ms == 0 {
            return Err(ConfigError::Validation(
                "search.watchdog_ms must be > 0".into(),
            ));
        }

        if self.room.ttl_secs == 0 {
            return Err(ConfigError::Validation("room.ttl_secs must be > 0".into()));
        }
        if self.room.code_attempts == 0 {
            return Err(ConfigError::Validation(
                "room.code_attempts must be > 0".into(),
            ));
        }
        if self.room.write_attempts == 0 {
            return Err(ConfigError::Validation(
                "room.write_attempts must be > 0".into(),
            ));
        }

        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "poll.interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}
