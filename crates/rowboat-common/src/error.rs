//! Common error types used throughout rowboat.
//!
//! This module provides a unified error type covering the failure cases of a
//! thin, fail-fast persistence layer: missing initialization, unregistered
//! record types, misconfiguration, scope-discipline violations, and
//! propagated storage failures. Nothing in this layer retries or recovers.

/// Common error type for rowboat.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A persistence operation was invoked before the registry was built.
    #[error("Rowboat is not initialized; build a Registry before using record operations")]
    NotInitialized,

    /// The record type was never registered with the registry.
    #[error("Record type '{0}' is not registered with the registry")]
    NotRegistered(String),

    /// The configuration does not support the requested mode of operation.
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// Scopes were opened or closed out of order, or used after close.
    #[error("Scope discipline violation: {0}")]
    ScopeViolation(String),

    /// A storage engine operation failed. Propagated unchanged, never retried.
    #[error("Database error: {0}")]
    Database(String),

    /// The connection pool could not provide a connection.
    #[error("Pool error: {0}")]
    Pool(String),

    /// The application configuration could not be loaded or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new NotRegistered error.
    pub fn not_registered<S: Into<String>>(entity: S) -> Self {
        Self::NotRegistered(entity.into())
    }

    /// Create a new Misconfigured error.
    pub fn misconfigured<S: Into<String>>(msg: S) -> Self {
        Self::Misconfigured(msg.into())
    }

    /// Create a new ScopeViolation error.
    pub fn scope_violation<S: Into<String>>(msg: S) -> Self {
        Self::ScopeViolation(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Pool error.
    pub fn pool<S: Into<String>>(msg: S) -> Self {
        Self::Pool(msg.into())
    }

    /// Create a new Config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_registered("Post");
        assert_eq!(
            err.to_string(),
            "Record type 'Post' is not registered with the registry"
        );

        let err = Error::misconfigured("scope strategy is not request-aware");
        assert_eq!(
            err.to_string(),
            "Misconfigured: scope strategy is not request-aware"
        );

        let err = Error::scope_violation("scope closed out of order");
        assert_eq!(
            err.to_string(),
            "Scope discipline violation: scope closed out of order"
        );

        let err = Error::database("disk full");
        assert_eq!(err.to_string(), "Database error: disk full");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::not_registered("x"), Error::NotRegistered(_)));
        assert!(matches!(Error::misconfigured("x"), Error::Misconfigured(_)));
        assert!(matches!(
            Error::scope_violation("x"),
            Error::ScopeViolation(_)
        ));
        assert!(matches!(Error::database("x"), Error::Database(_)));
        assert!(matches!(Error::pool("x"), Error::Pool(_)));
        assert!(matches!(Error::config("x"), Error::Config(_)));
    }

    #[test]
    fn test_result_type() {
        fn ok_fn() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(ok_fn().unwrap(), 42);

        fn err_fn() -> Result<i32> {
            Err(Error::NotInitialized)
        }
        assert!(err_fn().is_err());
    }
}
