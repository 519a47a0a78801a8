//! Common error types for DTR

use thiserror::Error;

/// Common result type for DTR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across DTR crates
#[derive(Error, Debug)]
pub enum Error {
    /// Granularity is not a positive divisor of one day
    #[error("Invalid granularity: {0}")]
    InvalidGranularity(String),

    /// Duration string could not be parsed (e.g. "1h30", "2x")
    #[error("Invalid duration format: {0}")]
    InvalidDurationFormat(String),

    /// Record has no usable target_day, so it cannot be classified
    #[error("Missing target day: {0}")]
    MissingTargetDay(String),

    /// Record window is well-formed but inverted or empty (start >= end)
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Persistence gateway failure not originating from sqlx
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors raised by the persistence layer
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Persistence(_))
    }

    /// True for errors that make a whole run unsafe to attempt
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::InvalidGranularity(_) | Error::InvalidDurationFormat(_) | Error::Config(_)
        )
    }
}
