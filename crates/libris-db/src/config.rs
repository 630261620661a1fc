//! # Library Configuration
//!
//! Where the database lives and what the lending terms are.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LIBRIS_DB_PATH=/srv/library.db                                     │
//! │     LIBRIS_LOAN_PERIOD_DAYS=15                                         │
//! │     LIBRIS_DAILY_FINE_CENTS=500                                        │
//! │     LIBRIS_MAX_CONNECTIONS=8                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/libris/library.toml (Linux)                              │
//! │     ~/Library/Application Support/org.libris.libris/library.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     14-day loans, 5.00 per overdue day                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/libris/library.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [lending]
//! loan_period_days = 15
//! daily_fine_cents = 500
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;
use libris_core::validation::{validate_daily_fine, validate_loan_period_days};
use libris_core::{LoanPolicy, Money, DEFAULT_DAILY_FINE_CENTS, DEFAULT_LOAN_PERIOD_DAYS};

const CONFIG_FILE_NAME: &str = "library.toml";
const DATABASE_FILE_NAME: &str = "library.db";

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; created on first start.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on a locked database (milliseconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("org", "libris", "libris")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILE_NAME))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5_000
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// `[lending]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendingSettings {
    #[serde(default = "default_loan_period")]
    pub loan_period_days: u32,

    /// Fine per overdue day in cents.
    #[serde(default = "default_daily_fine")]
    pub daily_fine_cents: i64,
}

fn default_loan_period() -> u32 {
    DEFAULT_LOAN_PERIOD_DAYS
}

fn default_daily_fine() -> i64 {
    DEFAULT_DAILY_FINE_CENTS
}

impl Default for LendingSettings {
    fn default() -> Self {
        LendingSettings {
            loan_period_days: default_loan_period(),
            daily_fine_cents: default_daily_fine(),
        }
    }
}

// =============================================================================
// Library Configuration
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub lending: LendingSettings,
}

impl LibraryConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`library.toml`), if it exists
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Parses a config file without applying overrides.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading library config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Writes the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;

        info!(?path, "Library config saved");
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_loan_period_days(self.lending.loan_period_days)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        validate_daily_fine(Money::from_cents(self.lending.daily_fine_cents))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database path is empty".into()));
        }

        Ok(())
    }

    /// Applies `LIBRIS_*` overrides from `lookup` (the process environment
    /// in [`load`](Self::load)). Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("LIBRIS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(days) = parsed(&lookup, "LIBRIS_LOAN_PERIOD_DAYS") {
            self.lending.loan_period_days = days;
        }

        if let Some(cents) = parsed(&lookup, "LIBRIS_DAILY_FINE_CENTS") {
            self.lending.daily_fine_cents = cents;
        }

        if let Some(max) = parsed(&lookup, "LIBRIS_MAX_CONNECTIONS") {
            self.database.max_connections = max;
        }
    }

    /// The lending terms as a validated [`LoanPolicy`].
    pub fn loan_policy(&self) -> ConfigResult<LoanPolicy> {
        LoanPolicy::new(
            self.lending.loan_period_days,
            Money::from_cents(self.lending.daily_fine_cents),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Pool settings for [`Database::new`](crate::Database::new).
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "libris", "libris")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => {
            debug!(key, value = %raw, "Overriding setting from environment");
            Some(value)
        }
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
