//! Error types for bgdb-engine

use bgdb_query::{CompileError, EvalError, ParseError};
use bgdb_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for search operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed or semantically invalid command text
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Criteria that cannot be executed in this context
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Corpus, library or history access failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// A newer search started before this one finished
    #[error("Search superseded by a newer request")]
    Superseded,

    /// Unknown filter or history entry
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        match self {
            EngineError::NotFound(_) => true,
            EngineError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<EvalError> for EngineError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Cancelled => EngineError::Superseded,
        }
    }
}
