//! # autocrew
//!
//! Self-extending agent orchestration.
//!
//! Two independent loops live in this crate:
//!
//! - [`planning`]: a goal planning loop that recovers from missing
//!   capabilities. When the planner's failure diagnostic names helpers it
//!   lacks, each one is synthesized as a sub-agent backed capability,
//!   registered, and the plan is retried, up to an explicit iteration bound.
//! - [`team`] and [`conversation`]: a free-form assignment is decomposed into
//!   a team of 2-5 role agents plus a coordinator, who then converse in
//!   turns. After a fixed-order first pass the coordinator routes each turn
//!   and declares the final answer.
//!
//! Model calls, agent hosting and conversation threads are external
//! collaborators reached through the traits in [`generation`], [`agents`],
//! [`planning::PlanningService`] and [`conversation::ConversationTransport`].
//! Every call into them runs under a [`CallGuard`] (timeout plus
//! cancellation), and every agent a session creates is released when the
//! session ends.

pub mod agents;
pub mod capabilities;
pub mod conversation;
pub mod generation;
pub mod planning;
pub mod team;
pub mod utilities;

#[cfg(test)]
pub(crate) mod test_support;

pub use agents::{Agent, AgentDefinition, AgentFactory, AgentHandle, ResourceScope};
pub use capabilities::{Capability, CapabilityHandler, CapabilityRegistry};
pub use conversation::{
    ConversationScheduler, ConversationTransport, Message, TeamSession, Transcript,
};
pub use generation::StructuredGenerationService;
pub use planning::{
    CapabilitySynthesizer, GapExtractor, GoalPlanningLoop, PlanOutcome, PlanReport,
    PlanningError, PlanningService,
};
pub use team::{RoleSpec, Team, TeamComposer};
pub use utilities::{AutoCrewConfig, CallError, CallGuard};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
