//! Configuration for bgdb-engine
//!
//! Read from `bgdb.toml` in the platform config directory unless a path is
//! given. Every section and field is optional; missing values use defaults.

use std::path::{Path, PathBuf};

use bgdb_domain::MatchEquityTable;
use bgdb_query::{Perspective, ResultOrder};
use serde::{Deserialize, Serialize};

/// Application directory name under the platform config and data dirs
const APP_DIR: &str = "bgdb";

/// Engine-wide configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database location
    pub database: DatabaseConfig,
    /// Search defaults
    pub search: SearchConfig,
    /// Search history settings
    pub history: HistoryConfig,
    /// Match equity table used for `sc`
    pub match_equity: MatchEquityConfig,
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file; the platform data dir when unset
    pub path: Option<PathBuf>,
}

/// Search defaults applied when a request does not say otherwise
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub perspective: Perspective,
    pub order: ResultOrder,
    /// Narrow the corpus with indexed columns before evaluating
    pub use_prefilter: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            perspective: Perspective::OnRoll,
            order: ResultOrder::Id,
            use_prefilter: true,
        }
    }
}

/// Search history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of most recent entries kept
    pub retention: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { retention: 100 }
    }
}

/// Match equity table parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchEquityConfig {
    /// Fraction of games that end in a gammon
    pub gammon_rate: f64,
    /// Longest match length covered
    pub max_away: usize,
}

impl Default for MatchEquityConfig {
    fn default() -> Self {
        Self {
            gammon_rate: MatchEquityTable::DEFAULT_GAMMON_RATE,
            max_away: MatchEquityTable::DEFAULT_MAX_AWAY,
        }
    }
}

impl MatchEquityConfig {
    pub fn table(&self) -> MatchEquityTable {
        MatchEquityTable::with_max_away(self.gammon_rate, self.max_away)
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Read and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config =
            Self::from_toml(&text).map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read the default config file if there is one, else use defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Database path, falling back to the platform data dir.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join("bgdb.sqlite"))
            .ok_or_else(|| ConfigError::MissingField("database.path".to_string()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history.retention == 0 {
            return Err(ConfigError::OutOfRange(
                "history.retention must be positive".to_string(),
            ));
        }

        let rate = self.match_equity.gammon_rate;
        if !(0.0..1.0).contains(&rate) {
            return Err(ConfigError::OutOfRange(
                "match_equity.gammon_rate must be in [0.0, 1.0)".to_string(),
            ));
        }

        let max_away = self.match_equity.max_away;
        if !(2..=MatchEquityTable::MAX_AWAY_LIMIT).contains(&max_away) {
            return Err(ConfigError::OutOfRange(format!(
                "match_equity.max_away must be in [2, {}]",
                MatchEquityTable::MAX_AWAY_LIMIT
            )));
        }

        Ok(())
    }
}

/// `bgdb.toml` in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("bgdb.toml"))
}

/// Configuration loading or validation error
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Value is out of valid range
    OutOfRange(String),
    /// Required field is missing
    MissingField(String),
    /// File could not be read
    Io(String),
    /// File is not valid TOML for this configuration
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::OutOfRange(msg) => write!(f, "Value out of range: {}", msg),
            ConfigError::MissingField(msg) => write!(f, "Missing field: {}", msg),
            ConfigError::Io(msg) => write!(f, "Cannot read configuration: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
