//! Capability synthesis: backing a missing capability with a fresh sub-agent.
//!
//! For each gap request the synthesizer instantiates an autonomous sub-agent
//! whose instructions embed the request's description and schema, and
//! exposes it through an [`AgentCapability`] handler so the registry can
//! dispatch to it by name. The sub-agent is tracked in the session's
//! [`ResourceScope`]; the session releases it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::gap_extractor::CapabilityGapRequest;
use crate::agents::{AgentDefinition, AgentFactory, AgentHandle, ResourceScope};
use crate::capabilities::{Capability, CapabilityHandler};
use crate::utilities::deadline::CallGuard;
use crate::utilities::errors::{BoxError, CallError};
use crate::utilities::prompts::{synthesized_capability_instructions, PromptError};

/// Why a capability could not be synthesized.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// The agent backend failed, timed out, or the session was cancelled.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The sub-agent's instructions could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// A newly created capability and the handler that executes it.
#[derive(Clone)]
pub struct SynthesizedCapability {
    pub capability: Capability,
    pub handler: Arc<dyn CapabilityHandler>,
}

impl std::fmt::Debug for SynthesizedCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedCapability")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

/// Anything that can turn a gap request into an executable capability.
#[async_trait]
pub trait CapabilitySource: Send + Sync {
    /// Produce a capability for `request`. Resources created along the way
    /// must be tracked in `scope`.
    async fn synthesize(
        &self,
        request: &CapabilityGapRequest,
        scope: &mut ResourceScope,
        guard: &CallGuard,
    ) -> Result<SynthesizedCapability, SynthesisError>;
}

/// Synthesizes capabilities backed by sub-agents from an [`AgentFactory`].
#[derive(Clone)]
pub struct CapabilitySynthesizer {
    factory: Arc<dyn AgentFactory>,
}

impl CapabilitySynthesizer {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self { factory }
    }

    /// The sub-agent definition for a gap request.
    pub fn definition_for(
        &self,
        request: &CapabilityGapRequest,
    ) -> Result<AgentDefinition, PromptError> {
        let instructions = synthesized_capability_instructions(
            &request.name,
            &request.description,
            &request.input_schema,
            request.output_schema.as_ref(),
        )?;
        Ok(AgentDefinition::new(
            request.name.clone(),
            request.description.clone(),
            instructions,
        ))
    }
}

#[async_trait]
impl CapabilitySource for CapabilitySynthesizer {
    async fn synthesize(
        &self,
        request: &CapabilityGapRequest,
        scope: &mut ResourceScope,
        guard: &CallGuard,
    ) -> Result<SynthesizedCapability, SynthesisError> {
        let definition = self.definition_for(request)?;
        let agent = scope.spawn(self.factory.as_ref(), definition, guard).await?;

        log::info!(
            "Synthesized capability '{}' backed by agent '{}'",
            request.name,
            agent.handle().name()
        );

        Ok(SynthesizedCapability {
            capability: request.to_capability(),
            handler: Arc::new(AgentCapability::new(
                request.name.clone(),
                Arc::clone(agent.handle()),
                guard.clone(),
            )),
        })
    }
}

/// Capability handler that forwards calls to a sub-agent.
///
/// String input is sent verbatim; any other JSON value is serialized. The
/// agent's answer comes back as a JSON string. Each call runs under the
/// guard of the session that synthesized the capability.
pub struct AgentCapability {
    name: String,
    agent: Arc<dyn AgentHandle>,
    guard: CallGuard,
}

impl AgentCapability {
    pub fn new(name: impl Into<String>, agent: Arc<dyn AgentHandle>, guard: CallGuard) -> Self {
        Self {
            name: name.into(),
            agent,
            guard,
        }
    }
}

#[async_trait]
impl CapabilityHandler for AgentCapability {
    async fn invoke(&self, input: Value) -> Result<Value, BoxError> {
        let text = match input {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let operation = format!("invoke capability '{}'", self.name);
        let answer = self.guard.run(&operation, self.agent.invoke(&text)).await?;
        Ok(Value::String(answer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{OutputSchema, ParameterSchema};
    use crate::test_support::StubFactory;
    use std::time::Duration;

    fn request() -> CapabilityGapRequest {
        CapabilityGapRequest {
            name: "EvenOddRatio".into(),
            description: "Computes the ratio of even to odd digits".into(),
            input_schema: vec![ParameterSchema::new("digits", "string", "Digits")],
            output_schema: Some(OutputSchema::new("number", "The ratio")),
        }
    }

    #[tokio::test]
    async fn test_synthesize_creates_tracked_agent() {
        let factory = StubFactory::default();
        let synthesizer = CapabilitySynthesizer::new(Arc::new(factory.clone()));
        let mut scope = ResourceScope::new();
        let guard = CallGuard::new(Duration::from_secs(1));

        let synthesized = synthesizer
            .synthesize(&request(), &mut scope, &guard)
            .await
            .unwrap();

        assert_eq!(synthesized.capability.name, "EvenOddRatio");
        assert_eq!(scope.len(), 1);

        let created = factory.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].name, "EvenOddRatio");
        assert!(created[0].instructions.contains("Computes the ratio"));
        assert!(created[0].instructions.contains("- digits (string): Digits"));

        scope.release_all().await;
        assert_eq!(factory.released(), vec!["EvenOddRatio"]);
    }

    #[tokio::test]
    async fn test_handler_forwards_to_agent() {
        let factory = StubFactory::default();
        let synthesizer = CapabilitySynthesizer::new(Arc::new(factory));
        let mut scope = ResourceScope::new();
        let guard = CallGuard::new(Duration::from_secs(1));
        let synthesized = synthesizer
            .synthesize(&request(), &mut scope, &guard)
            .await
            .unwrap();

        let out = synthesized.handler.invoke(Value::from("2468")).await.unwrap();
        assert_eq!(out, Value::from("EvenOddRatio: 2468"));

        let out = synthesized
            .handler
            .invoke(serde_json::json!({"digits": "13"}))
            .await
            .unwrap();
        assert_eq!(out, Value::from(r#"EvenOddRatio: {"digits":"13"}"#));
        scope.release_all().await;
    }

    struct StalledAgent;

    #[async_trait]
    impl AgentHandle for StalledAgent {
        fn name(&self) -> &str {
            "Stalled"
        }

        async fn invoke(&self, _input: &str) -> Result<String, BoxError> {
            futures::future::pending().await
        }

        async fn release(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_sub_agent_times_out() {
        let guard = CallGuard::new(Duration::from_secs(5));
        let capability = AgentCapability::new("Stalled", Arc::new(StalledAgent), guard);

        let err = capability.invoke(Value::from("x")).await.unwrap_err();
        let call = err.downcast_ref::<CallError>().unwrap();
        assert!(matches!(call, CallError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_session_stops_capability_calls() {
        let factory = StubFactory::default();
        let synthesizer = CapabilitySynthesizer::new(Arc::new(factory));
        let mut scope = ResourceScope::new();
        let guard = CallGuard::new(Duration::from_secs(1));
        let synthesized = synthesizer
            .synthesize(&request(), &mut scope, &guard)
            .await
            .unwrap();

        guard.cancellation().cancel();
        let err = synthesized.handler.invoke(Value::from("2")).await.unwrap_err();
        assert!(err.downcast_ref::<CallError>().unwrap().is_cancelled());
        scope.release_all().await;
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_retried() {
        let factory = StubFactory::default().failing_create("EvenOddRatio");
        let synthesizer = CapabilitySynthesizer::new(Arc::new(factory.clone()));
        let mut scope = ResourceScope::new();
        let guard = CallGuard::new(Duration::from_secs(1));

        let err = synthesizer
            .synthesize(&request(), &mut scope, &guard)
            .await
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Call(CallError::Backend { .. })));
        assert_eq!(factory.create_calls(), 1);
        assert!(scope.is_empty());
    }
}
