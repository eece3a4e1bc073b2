//! Session-scoped ownership of agent resources.
//!
//! A [`ResourceScope`] collects every agent handle created during one session
//! (one planning run or one team conversation) and releases them all in a
//! single [`release_all`](ResourceScope::release_all) call. Sessions call it
//! on every return path; if a scope is dropped while still holding handles
//! (a panic, or the session future being dropped) the releases are spawned
//! onto the current tokio runtime.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use super::handle::{Agent, AgentDefinition, AgentFactory, AgentHandle};
use crate::utilities::deadline::CallGuard;
use crate::utilities::errors::CallError;

const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of releasing a scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReleaseReport {
    /// Handles released successfully.
    pub released: usize,
    /// Handles whose release failed or timed out.
    pub failures: Vec<ReleaseFailure>,
}

impl ReleaseReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseFailure {
    pub agent: String,
    pub reason: String,
}

/// Owner of every agent handle created during a session.
pub struct ResourceScope {
    session_id: Uuid,
    handles: Vec<Arc<dyn AgentHandle>>,
    release_timeout: Duration,
}

impl ResourceScope {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            handles: Vec::new(),
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
        }
    }

    /// Bound the time spent on each individual release.
    pub fn with_release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Take ownership of a handle's lifecycle.
    pub fn track(&mut self, handle: Arc<dyn AgentHandle>) -> Arc<dyn AgentHandle> {
        log::debug!("Session {} tracking agent '{}'", self.session_id, handle.name());
        self.handles.push(Arc::clone(&handle));
        handle
    }

    /// Create an agent through `factory` and track it.
    pub async fn spawn(
        &mut self,
        factory: &dyn AgentFactory,
        definition: AgentDefinition,
        guard: &CallGuard,
    ) -> Result<Agent, CallError> {
        let operation = format!("create agent '{}'", definition.name);
        let handle = guard.run(&operation, factory.create(&definition)).await?;
        let handle = self.track(handle);
        log::info!("Created agent '{}'", definition.name);
        Ok(Agent::new(definition, handle))
    }

    /// Number of handles currently owned.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release every tracked handle concurrently.
    ///
    /// Never fails: release errors are logged and reported. The scope is
    /// empty afterwards, so calling this twice is harmless.
    pub async fn release_all(&mut self) -> ReleaseReport {
        let handles = std::mem::take(&mut self.handles);
        if handles.is_empty() {
            return ReleaseReport::default();
        }
        let report = release_handles(handles, self.release_timeout).await;
        log::info!(
            "Session {} released {} agent(s), {} failure(s)",
            self.session_id,
            report.released,
            report.failures.len()
        );
        report
    }
}

impl Default for ResourceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.handles.iter().map(|h| h.name()).collect();
        f.debug_struct("ResourceScope")
            .field("session_id", &self.session_id)
            .field("handles", &names)
            .finish()
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let handles = std::mem::take(&mut self.handles);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                log::warn!(
                    "Session {} dropped with {} live agent(s); releasing in background",
                    self.session_id,
                    handles.len()
                );
                let timeout = self.release_timeout;
                runtime.spawn(async move {
                    release_handles(handles, timeout).await;
                });
            }
            Err(_) => log::error!(
                "Session {} dropped outside a runtime; {} agent(s) were not released",
                self.session_id,
                handles.len()
            ),
        }
    }
}

async fn release_handles(handles: Vec<Arc<dyn AgentHandle>>, timeout: Duration) -> ReleaseReport {
    let outcomes = join_all(handles.iter().map(|handle| async move {
        let result = match tokio::time::timeout(timeout, handle.release()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("release timed out after {:?}", timeout)),
        };
        (handle.name().to_string(), result)
    }))
    .await;

    let mut report = ReleaseReport::default();
    for (agent, result) in outcomes {
        match result {
            Ok(()) => report.released += 1,
            Err(reason) => {
                log::warn!("Failed to release agent '{}': {}", agent, reason);
                report.failures.push(ReleaseFailure { agent, reason });
            }
        }
    }
    report
}
