//! Conversation and session errors.

use thiserror::Error;

use super::message::Message;
use crate::team::CompositionError;
use crate::utilities::errors::CallError;

/// Why the scheduler stopped without a completion.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// A thread operation or agent turn failed, timed out, or was cancelled.
    #[error("conversation transport failed: {0}")]
    Transport(#[source] CallError),

    /// The coordinator kept naming no routable member.
    #[error("coordinator named no routable speaker (token: {token:?}) {attempts} time(s) in a row")]
    Unroutable { token: Option<String>, attempts: u32 },

    /// The coordinator kept delegating to its own capabilities.
    #[error("'{agent}' delegated more than {limit} time(s) in a row")]
    DelegationLimit { agent: String, limit: u32 },

    #[error("no result after {limit} coordinator turn(s)")]
    TurnLimitExceeded { limit: u32 },

    #[error("a conversation needs at least one member besides the coordinator")]
    EmptyTeam,

    #[error("invalid routing marker: {0}")]
    InvalidMarker(#[from] regex::Error),
}

impl ConversationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_cancelled())
    }
}

/// Why a [`TeamSession`](super::TeamSession) failed.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Composition(#[from] CompositionError),

    /// The conversation thread could not be opened.
    #[error("failed to open conversation thread: {0}")]
    Thread(#[source] CallError),

    /// The conversation aborted; `log` holds everything said before.
    #[error("conversation aborted: {source}")]
    Conversation {
        #[source]
        source: ConversationError,
        log: Vec<Message>,
    },
}

impl SessionError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Composition(e) => e.is_cancelled(),
            Self::Thread(e) => e.is_cancelled(),
            Self::Conversation { source, .. } => source.is_cancelled(),
        }
    }
}
