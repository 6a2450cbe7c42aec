//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DEPOT_DB_PATH=/var/lib/depot/depot.db                              │
//! │     DEPOT_FORECAST_DAYS=30                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/depot/depot.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.depot.depot/depot.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # depot.toml
//! [database]
//! path = "depot.db"
//! max_connections = 5
//! connect_timeout_secs = 30
//!
//! [reports]
//! due_soon_days = 3
//! trailing_days = 7
//! default_forecast_days = 14
//!
//! [ledger]
//! base_currency = "UZS"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use depot_core::validation::validate_currency;
use depot_core::{DEFAULT_DUE_SOON_DAYS, DEFAULT_TRAILING_DAYS};
use depot_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created on first start.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Pool acquire timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "depot", "depot")
        .map(|dirs| dirs.data_dir().join("depot.db"))
        .unwrap_or_else(|| PathBuf::from("depot.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Report Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSettings {
    /// A debt due within this many days is "due soon".
    #[serde(default = "default_due_soon_days")]
    pub due_soon_days: i64,

    /// Window of the shipped average the forecast projects from.
    #[serde(default = "default_trailing_days")]
    pub trailing_days: i64,

    /// Horizon used when the caller does not pass one.
    #[serde(default = "default_forecast_days")]
    pub default_forecast_days: i64,
}

fn default_due_soon_days() -> i64 {
    DEFAULT_DUE_SOON_DAYS
}

fn default_trailing_days() -> i64 {
    DEFAULT_TRAILING_DAYS
}

fn default_forecast_days() -> i64 {
    14
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            due_soon_days: default_due_soon_days(),
            trailing_days: default_trailing_days(),
            default_forecast_days: default_forecast_days(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    /// Currency ledger values and report amounts are kept in.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,
}

fn default_base_currency() -> String {
    "UZS".to_string()
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            base_currency: default_base_currency(),
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub reports: ReportSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl EngineConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration: defaults, then file, then environment.
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.database.max_connections == 0 {
            return Err(EngineError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.reports.trailing_days <= 0 {
            return Err(EngineError::InvalidConfig(
                "trailing_days must be greater than 0".into(),
            ));
        }

        if self.reports.due_soon_days < 0 || self.reports.default_forecast_days < 0 {
            return Err(EngineError::InvalidConfig(
                "report day counts must not be negative".into(),
            ));
        }

        validate_currency(&self.ledger.base_currency)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("DEPOT_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("DEPOT_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(m) => self.database.max_connections = m,
                Err(_) => warn!(value = %max, "Ignoring invalid DEPOT_MAX_CONNECTIONS"),
            }
        }

        if let Ok(days) = std::env::var("DEPOT_DUE_SOON_DAYS") {
            if let Ok(d) = days.parse::<i64>() {
                self.reports.due_soon_days = d;
            }
        }

        if let Ok(days) = std::env::var("DEPOT_FORECAST_DAYS") {
            if let Ok(d) = days.parse::<i64>() {
                self.reports.default_forecast_days = d;
            }
        }

        if let Ok(days) = std::env::var("DEPOT_TRAILING_DAYS") {
            if let Ok(d) = days.parse::<i64>() {
                self.reports.trailing_days = d;
            }
        }

        if let Ok(currency) = std::env::var("DEPOT_BASE_CURRENCY") {
            debug!(currency = %currency, "Overriding base currency from environment");
            self.ledger.base_currency = currency.to_uppercase();
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "depot", "depot")
            .map(|dirs| dirs.config_dir().join("depot.toml"))
    }

    /// Database settings as a pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }
}
