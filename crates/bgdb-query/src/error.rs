//! Error types for bgdb-query

use thiserror::Error;

/// What went wrong in a clause
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("unknown field")]
    UnknownField,

    #[error("missing value")]
    MissingValue,

    #[error("invalid number")]
    InvalidNumber,

    #[error("malformed date, expected yyyy, yyyy/mm or yyyy/mm/dd")]
    InvalidDate,

    #[error("invalid dice roll")]
    InvalidDice,

    #[error("invalid value for field '{0}'")]
    InvalidValue(String),

    #[error("invalid board pattern")]
    InvalidPattern,

    #[error("unterminated quote")]
    UnterminatedQuote,

    #[error("field '{0}' takes no value")]
    UnexpectedValue(String),

    #[error("operator '{op}' is not allowed for field '{field}'")]
    IllegalOperator { field: String, op: String },
}

/// A command that failed to parse: the first failing clause in left-to-right
/// order, with its byte offset in the command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at position {position}: '{token}'")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub token: String,
    pub position: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, token: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            token: token.into(),
            position,
        }
    }

    /// Well-formed clause using an operator its field does not accept
    pub fn is_semantic(&self) -> bool {
        matches!(self.kind, ParseErrorKind::IllegalOperator { .. })
    }
}

/// Errors turning criteria into an executable query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("Malformed criterion: {0}")]
    Malformed(String),

    #[error("Criterion '{0}' needs an anchor position")]
    MissingAnchor(String),

    #[error("Invalid text pattern '{pattern}': {reason}")]
    TextPattern { pattern: String, reason: String },
}

/// Errors while evaluating a compiled query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Evaluation cancelled")]
    Cancelled,
}
