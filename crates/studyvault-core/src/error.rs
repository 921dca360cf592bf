//! Error types for studyvault.

use thiserror::Error;

/// Result type alias using studyvault's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for studyvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot failed validation; carries every validation error found
    #[error("Invalid snapshot: {}", .0.join("; "))]
    InvalidSnapshot(Vec<String>),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("backup_2026-01-01_00-00-00.json".to_string());
        assert_eq!(
            err.to_string(),
            "Not found: backup_2026-01-01_00-00-00.json"
        );
    }

    #[test]
    fn test_error_display_user_not_found() {
        let err = Error::UserNotFound(42);
        assert_eq!(err.to_string(), "User not found: 42");
    }

    #[test]
    fn test_error_display_invalid_snapshot_joins_errors() {
        let err = Error::InvalidSnapshot(vec![
            "quizQuestions[0]: missing required field `quizId`".to_string(),
            "users[1]: missing required field `email`".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Invalid snapshot: "));
        assert!(msg.contains("`quizId`"));
        assert!(msg.contains("; users[1]"));
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("BACKUP_MAX_BACKUPS must be a number".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: BACKUP_MAX_BACKUPS must be a number"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match &err {
            Error::Io(inner) => assert_eq!(inner.kind(), std::io::ErrorKind::PermissionDenied),
            _ => panic!("Expected Io error"),
        }
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
