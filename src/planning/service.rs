//! The planner collaborator and the per-iteration attempt record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capabilities::CapabilityRegistry;
use crate::utilities::errors::BoxError;

/// Result of one plan-and-execute attempt.
///
/// `Failure` carries the planner's diagnostic; hard errors (network,
/// quota, crashes) are reported through the `Err` side of
/// [`PlanningService::attempt`] instead and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum PlanOutcome {
    Success(String),
    Failure(String),
}

/// Builds a plan for a goal from the registry's capabilities and executes it.
#[async_trait]
pub trait PlanningService: Send + Sync {
    async fn attempt(
        &self,
        goal: &str,
        capabilities: &CapabilityRegistry,
    ) -> Result<PlanOutcome, BoxError>;
}

/// One iteration of the planning loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanAttempt {
    pub goal: String,
    /// 1-based iteration number.
    pub iteration: usize,
    /// Capability names available to this attempt, sorted.
    pub registry_snapshot: Vec<String>,
    pub outcome: PlanOutcome,
}

impl PlanAttempt {
    pub fn new(
        goal: impl Into<String>,
        iteration: usize,
        registry: &CapabilityRegistry,
        outcome: PlanOutcome,
    ) -> Self {
        Self {
            goal: goal.into(),
            iteration,
            registry_snapshot: registry.names(),
            outcome,
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, PlanOutcome::Success(_))
    }
}
