use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Namespace in which an ambiguous definition was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbiguityKind {
    Column,
    Relation,
}

impl fmt::Display for AmbiguityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmbiguityKind::Column => write!(f, "column"),
            AmbiguityKind::Relation => write!(f, "relation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax error near '{near}'")]
    Syntax { near: String },

    #[error("Ambiguous definition for {kind} {name}")]
    Ambiguous { kind: AmbiguityKind, name: String },

    #[error("Column '{column}' does not exist in relation '{relation}'")]
    UnknownColumn { column: String, relation: String },

    #[error("Relation '{0}' not found or format not supported")]
    RelationNotFound(String),

    #[error("Predicate evaluation error: {0}")]
    PredicateEvaluation(String),

    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Cannot {operation} relation '{relation}' in state {state}")]
    InvalidScanState {
        relation: String,
        operation: &'static str,
        state: String,
    },

    #[error("Row {row_id} not found in relation '{relation}'")]
    RowNotFound { relation: String, row_id: u64 },

    #[error("Unexpected number of columns in relation '{relation}' row {row}: found {found}, expected {expected}")]
    MalformedRow {
        relation: String,
        row: u64,
        expected: usize,
        found: usize,
    },

    #[error("Join would enumerate {combinations} combinations, limit is {limit}")]
    JoinTooLarge { combinations: u64, limit: u64 },

    #[error("No current row")]
    NoCurrentRow,

    #[error("Column ordinal {ordinal} out of range ({count} columns)")]
    ColumnOutOfRange { ordinal: usize, count: usize },

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Read error on file {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl Error {
    pub fn syntax(near: impl Into<String>) -> Self {
        Error::Syntax { near: near.into() }
    }

    pub fn ambiguous_column(name: impl Into<String>) -> Self {
        Error::Ambiguous {
            kind: AmbiguityKind::Column,
            name: name.into(),
        }
    }

    pub fn ambiguous_relation(name: impl Into<String>) -> Self {
        Error::Ambiguous {
            kind: AmbiguityKind::Relation,
            name: name.into(),
        }
    }

    pub fn unknown_column(column: impl Into<String>, relation: impl Into<String>) -> Self {
        Error::UnknownColumn {
            column: column.into(),
            relation: relation.into(),
        }
    }

    /// True for errors a join recovers from by dropping the combination
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::PredicateEvaluation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
