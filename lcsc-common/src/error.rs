//! Common error types for the scheduler

use thiserror::Error;

/// Common result type for scheduler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the scheduler crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backlog file does not contain a required upstream table
    #[error("Backlog is missing required table '{0}'. Has the correction stage been run?")]
    MissingTable(String),

    /// Result tagged with a different training set than the backlog
    #[error("Attempting to mix results from multiple training sets. Previous='{previous}', New='{new}'")]
    TrainingSetMismatch {
        previous: String,
        new: String,
    },

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
