//! Agents: a definition bound to a live backend handle.
//!
//! Agent instantiation, invocation and deletion are owned by an external
//! backend reached through [`AgentFactory`] and [`AgentHandle`]. This crate
//! only decides *which* agents exist and when they are released.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capabilities::Capability;
use crate::utilities::deadline::CallGuard;
use crate::utilities::errors::{BoxError, CallError};

/// What to create: everything the backend needs to instantiate an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique within a team.
    pub name: String,
    pub description: String,
    pub instructions: String,
    /// Capabilities the agent may call.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

impl AgentDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            instructions: instructions.into(),
            capabilities: Vec::new(),
        }
    }

    /// Give the agent access to a capability.
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.push(capability);
        self
    }
}

/// A live agent instance held by the backend.
///
/// Each handle is a long-lived, billable resource: whoever creates one must
/// eventually call [`release`](AgentHandle::release).
#[async_trait]
pub trait AgentHandle: Send + Sync {
    /// Name the backend registered the agent under.
    fn name(&self) -> &str;

    /// Send input to the agent and wait for its answer.
    async fn invoke(&self, input: &str) -> Result<String, BoxError>;

    /// Delete the agent and free its backend resources.
    async fn release(&self) -> Result<(), BoxError>;
}

/// Creates agents on the backend.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn create(&self, definition: &AgentDefinition) -> Result<Arc<dyn AgentHandle>, BoxError>;
}

/// An agent as seen by teams and conversations.
#[derive(Clone)]
pub struct Agent {
    definition: AgentDefinition,
    handle: Arc<dyn AgentHandle>,
}

impl Agent {
    pub fn new(definition: AgentDefinition, handle: Arc<dyn AgentHandle>) -> Self {
        Self { definition, handle }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn description(&self) -> &str {
        &self.definition.description
    }

    pub fn instructions(&self) -> &str {
        &self.definition.instructions
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.definition.capabilities
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// The backend handle.
    pub fn handle(&self) -> &Arc<dyn AgentHandle> {
        &self.handle
    }

    /// Invoke the agent directly, under `guard`.
    pub async fn invoke(&self, input: &str, guard: &CallGuard) -> Result<String, CallError> {
        let operation = format!("invoke agent '{}'", self.name());
        guard.run(&operation, self.handle.invoke(input)).await
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.definition.name)
            .field("description", &self.definition.description)
            .field("capabilities", &self.definition.capabilities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubFactory;
    use std::time::Duration;

    #[tokio::test]
    async fn test_invoke_goes_through_handle() {
        let factory = StubFactory::default();
        let definition = AgentDefinition::new("Echo", "Echoes", "Repeat the input");
        let handle = factory.create(&definition).await.unwrap();
        let agent = Agent::new(definition, handle);

        let guard = CallGuard::new(Duration::from_secs(1));
        let reply = agent.invoke("ping", &guard).await.unwrap();
        assert_eq!(reply, "Echo: ping");
        assert_eq!(agent.name(), "Echo");
        assert_eq!(agent.handle().name(), "Echo");
    }

    #[test]
    fn test_definition_builder() {
        let def = AgentDefinition::new("A", "d", "i").with_capability(Capability::new("c", ""));
        assert_eq!(def.capabilities.len(), 1);
    }
}
