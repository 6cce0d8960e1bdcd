//! Error types for recurdo.

use thiserror::Error;

/// Main error type for task and engine operations.
#[derive(Error, Debug)]
pub enum RecurdoError {
    #[error("Recurrence error: {0}")]
    Recurrence(#[from] RecurrenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task {0} not found")]
    TaskNotFound(u64),

    #[error("Task {0} is not a recurring template")]
    NotRecurring(u64),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Could not use date '{input}': {reason}")]
    UnresolvedDate { input: String, reason: String },
}

/// Hard failures of the recurrence advancer.
///
/// These indicate corrupted records or a caller bug, never user input that
/// merely failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    #[error("Invalid recurrence pattern '{0}' (expected daily, weekly, monthly or yearly)")]
    InvalidPattern(String),

    #[error("Invalid recurrence interval {0} (must be at least 1)")]
    InvalidInterval(u32),

    #[error("Date out of range")]
    OutOfRange,
}

/// Persistence errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task database is locked: {0}")]
    Locked(String),
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type alias for recurdo operations.
pub type Result<T> = std::result::Result<T, RecurdoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecurdoError::Recurrence(RecurrenceError::InvalidPattern("hourly".to_string()));
        assert!(err.to_string().contains("hourly"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RecurdoError = StorageError::from(io_err).into();
        assert!(matches!(err, RecurdoError::Storage(StorageError::Io(_))));
    }
}
