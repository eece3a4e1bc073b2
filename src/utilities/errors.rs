//! Shared error types for calls into external collaborators.

use std::time::Duration;

use thiserror::Error;

/// Error type returned by every external collaborator (planner, agent
/// backend, generator, transport).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single guarded call into an external collaborator.
#[derive(Debug, Error)]
pub enum CallError {
    /// The collaborator did not answer within the configured timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    /// The session was cancelled while the call was in flight.
    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    /// The collaborator itself reported an error.
    #[error("{operation} failed: {source}")]
    Backend {
        operation: String,
        #[source]
        source: BoxError,
    },
}

impl CallError {
    /// Name of the operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            Self::Timeout { operation, .. }
            | Self::Cancelled { operation }
            | Self::Backend { operation, .. } => operation,
        }
    }

    /// Whether this failure came from cancellation rather than the backend.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_backend_error_keeps_source() {
        let err = CallError::Backend {
            operation: "plan attempt".into(),
            source: "quota exhausted".into(),
        };
        assert_eq!(err.operation(), "plan attempt");
        assert_eq!(err.source().unwrap().to_string(), "quota exhausted");
        assert!(err.to_string().contains("quota exhausted"));
    }

    #[test]
    fn test_timeout_display() {
        let err = CallError::Timeout {
            operation: "agent invoke".into(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "agent invoke timed out after 3s");
        assert!(!err.is_cancelled());
    }
}
