/*
[INPUT]:  Error sources (process spawning, I/O, option parsing, cancellation)
[OUTPUT]: Structured runtime error type with classification helpers
[POS]:    Error handling layer - unified error type for the runtime crate
[UPDATE]: When adding new error sources or changing classification
*/

use thiserror::Error;

/// Main error type for runtime client operations
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The source does not exist (never registered, or removed)
    #[error("source not found: {0}")]
    NotFound(String),

    /// The caller may not read this source
    #[error("permission denied for source {source_id}: {message}")]
    PermissionDenied { source_id: String, message: String },

    /// Underlying I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The lifetime token fired before the call completed
    #[error("operation cancelled")]
    Cancelled,

    /// Log options could not be interpreted
    #[error("invalid log options: {0}")]
    InvalidOptions(String),

    /// The source process could not be started
    #[error("failed to spawn source {source_id}: {message}")]
    Spawn { source_id: String, message: String },
}

impl RuntimeError {
    /// Check if the error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RuntimeError::Cancelled)
    }

    /// Check if the error means the source object no longer exists
    pub fn is_source_gone(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }
}

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(RuntimeError::Cancelled.is_cancelled());
        assert!(!RuntimeError::Cancelled.is_source_gone());

        let gone = RuntimeError::NotFound("web".to_string());
        assert!(gone.is_source_gone());
        assert!(!gone.is_cancelled());
    }

    #[test]
    fn test_error_messages() {
        let err = RuntimeError::PermissionDenied {
            source_id: "db".to_string(),
            message: "not in docker group".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "permission denied for source db: not in docker group"
        );

        let io: RuntimeError = std::io::Error::other("broken pipe").into();
        assert!(matches!(io, RuntimeError::Io(_)));
    }
}
