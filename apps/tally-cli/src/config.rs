//! CLI configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                   | Default      | Meaning                        |
//! |----------------------------|--------------|--------------------------------|
//! | `TALLY_DATABASE_PATH`      | `./tally.db` | SQLite file                    |
//! | `TALLY_UTC_OFFSET_MINUTES` | `0`          | Offset whose date is "today"   |
//! | `TALLY_MAX_CONNECTIONS`    | `5`          | Pool size                      |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tally_core::SystemClock;
use tally_db::DbConfig;

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Minutes east of UTC used to decide the current date
    pub utc_offset_minutes: i32,

    /// Maximum pooled connections
    pub max_connections: u32,
}

impl TallyConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = TallyConfig {
            database_path: lookup("TALLY_DATABASE_PATH")
                .unwrap_or_else(|| "./tally.db".to_string())
                .into(),

            utc_offset_minutes: lookup("TALLY_UTC_OFFSET_MINUTES")
                .unwrap_or_else(|| "0".to_string())
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TALLY_UTC_OFFSET_MINUTES".to_string()))?,

            max_connections: lookup("TALLY_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TALLY_MAX_CONNECTIONS".to_string()))?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("TALLY_MAX_CONNECTIONS".to_string()));
        }

        // Reject offsets chrono cannot represent (beyond ±24h)
        config.clock()?;

        Ok(config)
    }

    /// Clock reporting the date at the configured offset.
    pub fn clock(&self) -> Result<SystemClock, ConfigError> {
        SystemClock::with_offset_minutes(self.utc_offset_minutes)
            .ok_or_else(|| ConfigError::InvalidValue("TALLY_UTC_OFFSET_MINUTES".to_string()))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
