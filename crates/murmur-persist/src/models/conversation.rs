use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shown in place of a title the model has not produced yet
pub const UNTITLED: &str = "Untitled Chat";

/// A chat thread as shown in the conversation list.
///
/// `title` stays `None` until it is derived from the first exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: None,
            created_at: Utc::now(),
        }
    }

    /// Title for display, falling back to a placeholder
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
