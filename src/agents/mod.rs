//! Agent definitions, backend handles, and session-scoped resource ownership.

pub mod handle;
pub mod resources;

pub use handle::{Agent, AgentDefinition, AgentFactory, AgentHandle};
pub use resources::{ReleaseFailure, ReleaseReport, ResourceScope};
