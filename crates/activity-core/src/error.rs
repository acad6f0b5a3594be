//! Domain error types (spec §7).

use std::path::PathBuf;
use thiserror::Error;

/// An export file failed to parse. Carries enough detail to name the file
/// and, for JSON syntax errors, the line/column, per §7.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{path}: failed to read file: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}:{column}: invalid export JSON: {message}")]
    Json {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
}

impl ParseError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            ParseError::Io { path, .. } => path,
            ParseError::Json { path, .. } => path,
        }
    }
}

/// Failure surfaced by a [`crate::store::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),
    #[error("store transaction failed: {0}")]
    Transaction(String),
}

/// Top-level error for a single guild ingest run (spec §4.G "Failure semantics").
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
