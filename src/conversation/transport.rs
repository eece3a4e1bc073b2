//! The conversation backend: threads that agents take turns on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agents::Agent;
use crate::utilities::errors::BoxError;

/// A message produced by an agent on a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub content: String,
}

impl ThreadMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// A shared conversation thread. Every participant sees the whole thread.
#[async_trait]
pub trait ThreadHandle: Send {
    async fn add_user_message(&mut self, text: &str) -> Result<(), BoxError>;

    /// Let `agent` read the thread and reply; returns the messages it added.
    async fn invoke(&mut self, agent: &Agent) -> Result<Vec<ThreadMessage>, BoxError>;
}

/// Opens conversation threads.
#[async_trait]
pub trait ConversationTransport: Send + Sync {
    async fn new_thread(&self) -> Result<Box<dyn ThreadHandle>, BoxError>;
}
