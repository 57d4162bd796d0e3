//! Error types for mongo-mcp

use serde::Serialize;
use thiserror::Error;

/// Result type alias for mongo-mcp operations
pub type Result<T> = std::result::Result<T, MongoMcpError>;

/// Unified error type for all mongo-mcp operations
#[derive(Error, Debug, Clone)]
pub enum MongoMcpError {
    /// Malformed or missing caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unresolvable or invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cannot establish, or has lost, the underlying connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// The database rejected or failed a well-formed operation
    #[error("Operation error: {0}")]
    Operation(String),

    /// A feature flag disables the requested operation class
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error category as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    ValidationError,
    ConfigError,
    ConnectionError,
    OperationError,
    PermissionError,
    SerializationError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::ConfigError => "ConfigError",
            Self::ConnectionError => "ConnectionError",
            Self::OperationError => "OperationError",
            Self::PermissionError => "PermissionError",
            Self::SerializationError => "SerializationError",
            Self::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MongoMcpError {
    /// Returns the category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MongoMcpError::Validation(_) => ErrorKind::ValidationError,
            MongoMcpError::Config(_) => ErrorKind::ConfigError,
            MongoMcpError::Connection(_) => ErrorKind::ConnectionError,
            MongoMcpError::Operation(_) => ErrorKind::OperationError,
            MongoMcpError::Permission(_) => ErrorKind::PermissionError,
            MongoMcpError::Serialization(_) => ErrorKind::SerializationError,
            MongoMcpError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Returns the message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            MongoMcpError::Validation(msg)
            | MongoMcpError::Config(msg)
            | MongoMcpError::Connection(msg)
            | MongoMcpError::Operation(msg)
            | MongoMcpError::Permission(msg)
            | MongoMcpError::Serialization(msg)
            | MongoMcpError::Internal(msg) => msg,
        }
    }

    /// Returns true if the caller may reasonably retry the request.
    ///
    /// Retry policy belongs to the caller; nothing in this workspace retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MongoMcpError::Connection(_))
    }

    /// Returns true if the error was raised before any I/O took place
    pub fn is_pre_io(&self) -> bool {
        matches!(
            self,
            MongoMcpError::Validation(_) | MongoMcpError::Permission(_) | MongoMcpError::Config(_)
        )
    }
}

impl From<serde_json::Error> for MongoMcpError {
    fn from(err: serde_json::Error) -> Self {
        MongoMcpError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for MongoMcpError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind as DriverErrorKind;

        match *err.kind {
            DriverErrorKind::ServerSelection { .. }
            | DriverErrorKind::Io(_)
            | DriverErrorKind::ConnectionPoolCleared { .. }
            | DriverErrorKind::DnsResolve { .. }
            | DriverErrorKind::Authentication { .. } => MongoMcpError::Connection(err.to_string()),
            _ => MongoMcpError::Operation(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = MongoMcpError::Validation("field required".to_string());
        assert_eq!(err.to_string(), "Validation error: field required");
    }

    #[test]
    fn test_error_display_config() {
        let err = MongoMcpError::Config("unknown read preference".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown read preference");
    }

    #[test]
    fn test_error_display_connection() {
        let err = MongoMcpError::Connection("timeout".to_string());
        assert_eq!(err.to_string(), "Connection error: timeout");
    }

    #[test]
    fn test_error_display_operation() {
        let err = MongoMcpError::Operation("duplicate key".to_string());
        assert_eq!(err.to_string(), "Operation error: duplicate key");
    }

    #[test]
    fn test_error_display_permission() {
        let err = MongoMcpError::Permission("index operations are disabled".to_string());
        assert_eq!(err.to_string(), "Permission denied: index operations are disabled");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(MongoMcpError::Validation(String::new()).kind().as_str(), "ValidationError");
        assert_eq!(MongoMcpError::Config(String::new()).kind().as_str(), "ConfigError");
        assert_eq!(MongoMcpError::Connection(String::new()).kind().as_str(), "ConnectionError");
        assert_eq!(MongoMcpError::Operation(String::new()).kind().as_str(), "OperationError");
        assert_eq!(MongoMcpError::Permission(String::new()).kind().as_str(), "PermissionError");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: MongoMcpError = json_err.into();
        assert!(matches!(err, MongoMcpError::Serialization(_)));
    }

    #[test]
    fn test_is_retryable() {
        assert!(MongoMcpError::Connection("test".to_string()).is_retryable());
        assert!(!MongoMcpError::Operation("test".to_string()).is_retryable());
        assert!(!MongoMcpError::Validation("test".to_string()).is_retryable());
        assert!(!MongoMcpError::Permission("test".to_string()).is_retryable());
    }

    #[test]
    fn test_is_pre_io() {
        assert!(MongoMcpError::Validation("test".to_string()).is_pre_io());
        assert!(MongoMcpError::Permission("test".to_string()).is_pre_io());
        assert!(!MongoMcpError::Operation("test".to_string()).is_pre_io());
        assert!(!MongoMcpError::Connection("test".to_string()).is_pre_io());
    }
}
