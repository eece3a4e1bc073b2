//! Planning loop errors.

use thiserror::Error;

use super::synthesizer::SynthesisError;
use crate::capabilities::RegistryError;
use crate::utilities::errors::CallError;

/// Why a [`GoalPlanningLoop`](super::GoalPlanningLoop) run did not succeed.
///
/// Only recoverable gaps are handled inside the loop; every variant here is
/// terminal for the run and reaches the caller unmodified.
#[derive(Debug, Error)]
pub enum PlanningError {
    /// `max_iterations` was zero.
    #[error("iteration bound must be at least 1")]
    InvalidIterationBound,

    /// The planner itself failed (not a diagnostic): network, quota, timeout.
    #[error("planner failed: {0}")]
    Planner(#[source] CallError),

    /// The planner referenced a capability that was never registered.
    #[error("planner hallucinated a capability: {diagnostic}")]
    HallucinatedCapability { diagnostic: String },

    /// The diagnostic carried no usable gap payload.
    #[error("planner diagnostic is not actionable: {diagnostic}")]
    MalformedDiagnostic { diagnostic: String },

    /// Creating the backend for a missing capability failed.
    #[error("failed to synthesize capability '{name}': {source}")]
    Synthesis {
        name: String,
        #[source]
        source: SynthesisError,
    },

    /// The planner asked again for capabilities that are already registered.
    #[error("capabilities {names:?} are still reported missing after being registered")]
    GapNotResolved {
        names: Vec<String>,
        diagnostic: String,
    },

    /// The retry policy declined another attempt.
    #[error("retry declined after attempt {iteration}: {diagnostic}")]
    RetryDeclined { iteration: usize, diagnostic: String },

    /// The iteration bound was reached with gaps still outstanding.
    #[error("no plan after {max_iterations} attempt(s); still missing {pending:?}")]
    IterationLimitReached {
        max_iterations: usize,
        pending: Vec<String>,
    },

    /// Registering a synthesized capability failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl PlanningError {
    /// The planner diagnostic behind this error, when there is one.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::HallucinatedCapability { diagnostic }
            | Self::MalformedDiagnostic { diagnostic }
            | Self::GapNotResolved { diagnostic, .. }
            | Self::RetryDeclined { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }

    /// Whether the run stopped because the session was cancelled.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Planner(e) => e.is_cancelled(),
            Self::Synthesis {
                source: SynthesisError::Call(e),
                ..
            } => e.is_cancelled(),
            _ => false,
        }
    }
}
