//! Goal planning with on-demand capability synthesis.
//!
//! A [`GoalPlanningLoop`] repeatedly asks a [`PlanningService`] to plan for a
//! goal. When the planner reports missing capabilities, the
//! [`GapExtractor`] turns its diagnostic into [`CapabilityGapRequest`]s and a
//! [`CapabilitySource`] (by default the agent-backed
//! [`CapabilitySynthesizer`]) creates and registers each one before the next
//! attempt.

pub mod error;
pub mod gap_extractor;
pub mod planning_loop;
pub mod service;
pub mod synthesizer;

pub use error::PlanningError;
pub use gap_extractor::{extract_gaps, CapabilityGapRequest, DiagnosticClass, GapExtractor};
pub use planning_loop::{AlwaysRetry, GoalPlanningLoop, PlanReport, RetryContext, RetryPolicy};
pub use service::{PlanAttempt, PlanOutcome, PlanningService};
pub use synthesizer::{
    AgentCapability, CapabilitySource, CapabilitySynthesizer, SynthesisError,
    SynthesizedCapability,
};
