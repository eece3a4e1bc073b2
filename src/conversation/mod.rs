//! Turn-based team conversations.
//!
//! A [`ConversationScheduler`] drives a coordinator and its members over a
//! thread from a [`ConversationTransport`]: one fixed-order first pass, then
//! turns routed by the coordinator until it declares the result.
//! [`TeamSession`] wraps composition, the conversation and cleanup into a
//! single call.

pub mod error;
pub mod message;
pub mod observer;
pub mod routing;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use error::{ConversationError, SessionError};
pub use message::{Message, MessageRole};
pub use observer::{ConversationObserver, LoggingObserver, TurnRecord};
pub use routing::{resolve_speaker, CoordinatorDirective, DirectiveParser};
pub use scheduler::{
    ConversationScheduler, ConversationState, Phase, TerminalReason, Transcript, TurnOutcome,
};
pub use session::TeamSession;
pub use transport::{ConversationTransport, ThreadHandle, ThreadMessage};
