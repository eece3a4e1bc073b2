//! The goal planning loop.
//!
//! Each iteration asks the planner for a plan over the current registry. A
//! failure diagnostic that names missing capabilities is turned into gap
//! requests; every gap is synthesized and registered, and the planner is
//! asked again. Anything else ends the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::PlanningError;
use super::gap_extractor::{CapabilityGapRequest, DiagnosticClass, GapExtractor};
use super::service::{PlanAttempt, PlanOutcome, PlanningService};
use super::synthesizer::CapabilitySource;
use crate::agents::ResourceScope;
use crate::capabilities::CapabilityRegistry;
use crate::utilities::deadline::CallGuard;

/// What a [`RetryPolicy`] sees before the loop synthesizes and retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    /// 1-based iteration that just failed.
    pub iteration: usize,
    pub max_iterations: usize,
    /// Gaps about to be synthesized, deduplicated.
    pub gaps: &'a [CapabilityGapRequest],
    /// Registered capabilities before synthesis.
    pub registry_len: usize,
}

/// Decides whether a recoverable failure is worth another attempt.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, context: &RetryContext<'_>) -> bool;
}

/// Retries until the iteration bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl RetryPolicy for AlwaysRetry {
    fn should_retry(&self, _context: &RetryContext<'_>) -> bool {
        true
    }
}

impl<F> RetryPolicy for F
where
    F: Fn(&RetryContext<'_>) -> bool + Send + Sync,
{
    fn should_retry(&self, context: &RetryContext<'_>) -> bool {
        self(context)
    }
}

/// A successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanReport {
    /// The planner's output on the successful attempt.
    pub output: String,
    /// Every attempt, in order; the last one succeeded.
    pub attempts: Vec<PlanAttempt>,
    /// Names of the capabilities synthesized during the run, in creation order.
    pub synthesized: Vec<String>,
}

impl PlanReport {
    pub fn iterations(&self) -> usize {
        self.attempts.len()
    }
}

/// Plans toward a goal, growing the capability registry as the planner
/// reports gaps.
pub struct GoalPlanningLoop {
    planner: Arc<dyn PlanningService>,
    source: Arc<dyn CapabilitySource>,
    extractor: GapExtractor,
    retry_policy: Arc<dyn RetryPolicy>,
    guard: CallGuard,
}

impl GoalPlanningLoop {
    pub fn new(planner: Arc<dyn PlanningService>, source: Arc<dyn CapabilitySource>) -> Self {
        Self {
            planner,
            source,
            extractor: GapExtractor::new(),
            retry_policy: Arc::new(AlwaysRetry),
            guard: CallGuard::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replace the guard applied to planner and synthesis calls.
    pub fn with_call_guard(mut self, guard: CallGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        let cancel = self.guard.cancellation().clone();
        self.with_call_guard(CallGuard::new(timeout).with_cancellation(cancel))
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.guard = self.guard.with_cancellation(cancel);
        self
    }

    pub fn call_guard(&self) -> &CallGuard {
        &self.guard
    }

    /// Run the loop in a fresh session.
    ///
    /// Sub-agents synthesized during the run are released before this
    /// returns, on success and on every error path. Capabilities stay
    /// registered; their handlers fail once their agents are gone. Use
    /// [`run_in_scope`](Self::run_in_scope) to keep them alive.
    pub async fn run(
        &self,
        goal: &str,
        registry: &mut CapabilityRegistry,
        max_iterations: usize,
    ) -> Result<PlanReport, PlanningError> {
        let mut scope = ResourceScope::new();
        let result = self
            .run_in_scope(goal, registry, max_iterations, &mut scope)
            .await;
        let report = scope.release_all().await;
        if !report.is_clean() {
            log::warn!(
                "Planning session left {} agent(s) unreleased",
                report.failures.len()
            );
        }
        result
    }

    /// Run the loop, tracking synthesized sub-agents in a caller-owned scope.
    pub async fn run_in_scope(
        &self,
        goal: &str,
        registry: &mut CapabilityRegistry,
        max_iterations: usize,
        scope: &mut ResourceScope,
    ) -> Result<PlanReport, PlanningError> {
        if max_iterations == 0 {
            return Err(PlanningError::InvalidIterationBound);
        }

        let mut attempts = Vec::new();
        let mut synthesized = Vec::new();
        let mut pending = Vec::new();

        for iteration in 1..=max_iterations {
            log::info!(
                "Planning attempt {}/{} with {} capabilities",
                iteration,
                max_iterations,
                registry.len()
            );

            let outcome = self
                .guard
                .run("plan attempt", self.planner.attempt(goal, registry))
                .await
                .map_err(PlanningError::Planner)?;
            attempts.push(PlanAttempt::new(goal, iteration, registry, outcome.clone()));

            let diagnostic = match outcome {
                PlanOutcome::Success(output) => {
                    log::info!("Plan succeeded on attempt {}", iteration);
                    return Ok(PlanReport {
                        output,
                        attempts,
                        synthesized,
                    });
                }
                PlanOutcome::Failure(diagnostic) => diagnostic,
            };

            let gaps = match self.extractor.classify(&diagnostic) {
                DiagnosticClass::Gaps(gaps) => dedupe(gaps),
                DiagnosticClass::Hallucinated => {
                    return Err(PlanningError::HallucinatedCapability { diagnostic })
                }
                DiagnosticClass::Malformed => {
                    return Err(PlanningError::MalformedDiagnostic { diagnostic })
                }
            };

            let unresolved: Vec<String> = gaps
                .iter()
                .filter(|gap| registry.contains(&gap.name))
                .map(|gap| gap.name.clone())
                .collect();
            if !unresolved.is_empty() {
                return Err(PlanningError::GapNotResolved {
                    names: unresolved,
                    diagnostic,
                });
            }

            let names: Vec<String> = gaps.iter().map(|gap| gap.name.clone()).collect();
            log::info!("Attempt {} is missing capabilities {:?}", iteration, names);

            if iteration == max_iterations {
                pending = names;
                break;
            }

            let context = RetryContext {
                iteration,
                max_iterations,
                gaps: &gaps,
                registry_len: registry.len(),
            };
            if !self.retry_policy.should_retry(&context) {
                return Err(PlanningError::RetryDeclined {
                    iteration,
                    diagnostic,
                });
            }

            for gap in &gaps {
                let created = self
                    .source
                    .synthesize(gap, scope, &self.guard)
                    .await
                    .map_err(|source| PlanningError::Synthesis {
                        name: gap.name.clone(),
                        source,
                    })?;
                registry.register_with_handler(created.capability, created.handler)?;
                synthesized.push(gap.name.clone());
            }
        }

        log::warn!(
            "No plan after {} attempt(s); still missing {:?}",
            max_iterations,
            pending
        );
        Err(PlanningError::IterationLimitReached {
            max_iterations,
            pending,
        })
    }
}

/// Keep the first request for each name.
fn dedupe(gaps: Vec<CapabilityGapRequest>) -> Vec<CapabilityGapRequest> {
    let mut seen = HashSet::new();
    gaps.into_iter()
        .filter(|gap| seen.insert(gap.name.clone()))
        .collect()
}
