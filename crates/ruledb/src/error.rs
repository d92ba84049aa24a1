//! Error types for the ruledb crate

use thiserror::Error;

/// Errors that can occur while reading the rule catalog
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, Error>;
