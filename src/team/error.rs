//! Team composition errors.

use thiserror::Error;

use super::role_spec::{MAX_TEAM_SIZE, MIN_TEAM_SIZE};
use crate::utilities::errors::CallError;
use crate::utilities::prompts::PromptError;

/// Why a team could not be composed or instantiated.
///
/// Every variant is fatal: no partial team is ever returned.
#[derive(Debug, Error)]
pub enum CompositionError {
    /// The structured generation call failed.
    #[error("team generation failed: {0}")]
    Generation(#[source] CallError),

    /// The generated text is not a JSON array in an accepted framing.
    #[error("team response is not a valid JSON array: {reason}")]
    InvalidJson { reason: String, raw: String },

    #[error("team must have between {MIN_TEAM_SIZE} and {MAX_TEAM_SIZE} members, got {count}")]
    TeamSize { count: usize },

    /// A role entry lacks a required field, or the field is blank.
    #[error("team member #{index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("team member name '{name}' is not unique")]
    DuplicateName { name: String },

    /// Creating the agent for a role (or the coordinator) failed.
    #[error("failed to create agent '{name}': {source}")]
    Instantiation {
        name: String,
        #[source]
        source: CallError,
    },

    #[error(transparent)]
    Prompt(#[from] PromptError),
}

impl CompositionError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Generation(e) | Self::Instantiation { source: e, .. } => e.is_cancelled(),
            _ => false,
        }
    }
}
