//! Shared utilities: configuration, errors, call guarding, JSON extraction
//! and prompt templates.

pub mod config;
pub mod deadline;
pub mod errors;
pub mod json_blocks;
pub mod prompts;

pub use config::{
    AutoCrewConfig, CompositionConfig, ConfigError, ConversationConfig, PlanningConfig,
    UnroutablePolicy,
};
pub use deadline::CallGuard;
pub use errors::{BoxError, CallError};
