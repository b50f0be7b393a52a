//! Error types for the ingestion pipeline.
//!
//! Library code returns these typed errors so callers can tell the failure
//! classes apart: a file that was never attempted, a file no candidate
//! encoding could read, a store write that left the prior table untouched,
//! and a write whose read-back disagrees with what was loaded.

use std::{fmt, path::PathBuf};

use thiserror::Error;

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// One failed decode-and-parse attempt for a candidate encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub candidate: String,
    pub reason: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Unsupported file type '{extension}' for {path:?} (expected .txt, .csv, .xlsx or .xls)")]
    UnsupportedFileType { path: PathBuf, extension: String },

    #[error("Could not decode {path:?} with any of {} candidate encoding(s); last error: {}", .attempts.len(), last_reason(.attempts))]
    EncodingExhausted {
        path: PathBuf,
        attempts: Vec<AttemptFailure>,
    },

    #[error("Writing table '{table}' failed: {source}")]
    StoreWrite {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("Table '{table}' was written but verification failed: {}", .mismatches.join("; "))]
    StoreVerifyMismatch {
        table: String,
        mismatches: Vec<String>,
    },

    #[error("Reading back table '{table}' failed: {source}")]
    Store {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn last_reason(attempts: &[AttemptFailure]) -> String {
    attempts
        .last()
        .map(|attempt| attempt.to_string())
        .unwrap_or_else(|| "no candidates".to_string())
}

/// Why decoded text or a worksheet could not become a table.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("no header row")]
    NoColumns,

    #[error("row {row} has {found} fields, but the header has {expected}")]
    RowTooLong {
        row: usize,
        found: usize,
        expected: usize,
    },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid table name '{0}'")]
    InvalidTableName(String),

    #[error("Cannot create table '{0}' without columns")]
    NoColumns(String),

    #[error("Invalid pragma value '{0}'")]
    InvalidPragma(String),

    #[error("Table '{0}' does not exist")]
    MissingTable(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Reading configuration {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parsing configuration YAML failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid file pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
