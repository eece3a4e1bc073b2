//! Timeout and cancellation guard for blocking calls into collaborators.
//!
//! Every call the planning loop, the team composer and the conversation
//! scheduler make to an external service goes through a [`CallGuard`], so an
//! unresponsive backend can never stall a session indefinitely.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::errors::{BoxError, CallError};

/// Applies a per-call timeout and a session-wide cancellation token.
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallGuard {
    /// Create a guard with the given per-call timeout and a fresh token.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an existing cancellation token (e.g. one shared with the caller).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The per-call timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The cancellation token observed by this guard.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the session has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast with [`CallError::Cancelled`] if the session was cancelled.
    pub fn check(&self, operation: &str) -> Result<(), CallError> {
        if self.cancel.is_cancelled() {
            return Err(CallError::Cancelled {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Run `call` under the timeout, racing it against cancellation.
    pub async fn run<T, F>(&self, operation: &str, call: F) -> Result<T, CallError>
    where
        F: Future<Output = Result<T, BoxError>>,
    {
        self.check(operation)?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                log::warn!("{} cancelled while in flight", operation);
                Err(CallError::Cancelled { operation: operation.to_string() })
            }
            outcome = tokio::time::timeout(self.timeout, call) => match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(source)) => Err(CallError::Backend {
                    operation: operation.to_string(),
                    source,
                }),
                Err(_) => {
                    log::warn!("{} timed out after {:?}", operation, self.timeout);
                    Err(CallError::Timeout {
                        operation: operation.to_string(),
                        timeout: self.timeout,
                    })
                }
            },
        }
    }
}

impl Default for CallGuard {
    fn default() -> Self {
        Self::new(Duration::from_secs(120))
    }
}
