use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Conversation, DBMessage};

/// Trait for the conversation store
///
/// Messages are append-only. The single exception is the trailing assistant
/// message of a conversation, whose text grows while a reply is streaming.
#[async_trait]
pub trait PersistenceClient: Send + Sync {
    /// Create a new, untitled conversation
    async fn create_conversation(&self) -> Result<Conversation>;

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// All conversations, newest first
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Set the title once; a second call fails with `TitleAlreadySet`
    async fn set_title(&self, conversation_id: &str, title: String) -> Result<()>;

    /// Delete a conversation together with its messages
    async fn delete_conversation(&self, conversation_id: &str) -> Result<()>;

    /// Append a message to its conversation
    async fn save_message(&self, message: DBMessage) -> Result<()>;

    /// Append streamed text to the trailing assistant message
    async fn append_to_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        delta: &str,
    ) -> Result<()>;

    /// Messages of a conversation ordered by `created_at` (ties keep insertion order)
    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<DBMessage>>;

    /// Mark a reply turn as running on a conversation. Returns `false` if one
    /// already is; every session sharing this store sees the same marks.
    fn try_begin_turn(&self, conversation_id: &str) -> Result<bool>;

    /// Clear the running-turn mark set by `try_begin_turn`
    fn end_turn(&self, conversation_id: &str);

    fn turn_in_progress(&self, conversation_id: &str) -> bool;
}
