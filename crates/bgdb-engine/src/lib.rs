//! Search orchestration for bgdb
//!
//! Ties the query pipeline to persistence: a [`SearchEngine`] parses a command,
//! compiles it, loads the corpus (narrowed by the index prefilter when
//! enabled), evaluates, and records the search in history. Saved filters and
//! history replay go through the same path.
//!
//! Only the newest search of a [`SearchSession`] may commit. An older search
//! that is still running ends with [`EngineError::Superseded`] and leaves
//! history and the last result set as they were.

pub mod config;
pub mod engine;
pub mod error;
pub mod session;

pub use config::{
    default_config_path, ConfigError, DatabaseConfig, EngineConfig, HistoryConfig,
    MatchEquityConfig, SearchConfig,
};
pub use engine::{SearchEngine, SearchRequest, SearchResults};
pub use error::{EngineError, Result};
pub use session::{SearchSession, SearchTicket};
