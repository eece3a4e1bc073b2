//! Conversation log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Coordinator,
    Member,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Coordinator => write!(f, "coordinator"),
            Self::Member => write!(f, "member"),
        }
    }
}

/// One entry of the append-only conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_name: String,
    pub role: MessageRole,
    pub content: String,
    /// Position in the log, starting at 0.
    pub sequence_number: u64,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(
        sender_name: impl Into<String>,
        role: MessageRole,
        content: impl Into<String>,
        sequence_number: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_name: sender_name.into(),
            role,
            content: content.into(),
            sequence_number,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_role_in_snake_case() {
        let msg = Message::new("Project Manager", MessageRole::Coordinator, "Hello", 1);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "coordinator");
        assert_eq!(json["sequence_number"], 1);
        assert_eq!(MessageRole::Member.to_string(), "member");
    }
}
