use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage-agnostic message model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DBMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl DBMessage {
    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::User, content)
    }

    /// Assistant message, usually created empty and filled as the reply streams in
    pub fn assistant(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(conversation_id, MessageRole::Assistant, content)
    }

    fn new(conversation_id: impl Into<String>, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

// Conversion: DBMessage → murmur_llm::Message
impl From<DBMessage> for murmur_llm::Message {
    fn from(msg: DBMessage) -> Self {
        match msg.role {
            MessageRole::User => murmur_llm::Message::human(msg.content),
            MessageRole::Assistant => murmur_llm::Message::ai(msg.content),
        }
    }
}
