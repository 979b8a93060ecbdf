//! In-memory conversation store.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{PersistError, Result};
use crate::models::{Conversation, DBMessage, MessageRole};
use crate::trait_client::PersistenceClient;

#[derive(Default)]
struct Inner {
    conversations: HashMap<String, Conversation>,
    // Conversation ids in creation order
    order: Vec<String>,
    // Insertion order per conversation
    messages: HashMap<String, Vec<DBMessage>>,
    active_turns: HashSet<String>,
}

/// [`PersistenceClient`] backed by maps behind a `RwLock`.
///
/// Locks are never held across an await point.
#[derive(Default)]
pub struct InMemoryPersistenceClient {
    inner: RwLock<Inner>,
}

impl InMemoryPersistenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| PersistError::Internal(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| PersistError::Internal(e.to_string()))
    }
}

#[async_trait]
impl PersistenceClient for InMemoryPersistenceClient {
    async fn create_conversation(&self) -> Result<Conversation> {
        let conversation = Conversation::new();
        let mut inner = self.write()?;
        inner.messages.insert(conversation.id.clone(), Vec::new());
        inner.order.push(conversation.id.clone());
        inner
            .conversations
            .insert(conversation.id.clone(), conversation.clone());

        tracing::debug!(conversation_id = %conversation.id, "created conversation");
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self.read()?.conversations.get(conversation_id).cloned())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let inner = self.read()?;
        let mut conversations: Vec<Conversation> = inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.conversations.get(id).cloned())
            .collect();
        // Stable: equal timestamps keep newest-created first
        conversations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(conversations)
    }

    async fn set_title(&self, conversation_id: &str, title: String) -> Result<()> {
        let mut inner = self.write()?;
        let conversation = inner
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| PersistError::ConversationNotFound(conversation_id.to_string()))?;

        if conversation.title.is_some() {
            return Err(PersistError::TitleAlreadySet(conversation_id.to_string()));
        }
        conversation.title = Some(title);
        Ok(())
    }

    async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .conversations
            .remove(conversation_id)
            .ok_or_else(|| PersistError::ConversationNotFound(conversation_id.to_string()))?;
        inner.messages.remove(conversation_id);
        inner.order.retain(|id| id != conversation_id);

        tracing::debug!(conversation_id, "deleted conversation");
        Ok(())
    }

    async fn save_message(&self, message: DBMessage) -> Result<()> {
        let mut inner = self.write()?;
        let messages = inner
            .messages
            .get_mut(&message.conversation_id)
            .ok_or_else(|| PersistError::ConversationNotFound(message.conversation_id.clone()))?;
        messages.push(message);
        Ok(())
    }

    async fn append_to_message(
        &self,
        conversation_id: &str,
        message_id: &str,
        delta: &str,
    ) -> Result<()> {
        let mut inner = self.write()?;
        let messages = inner
            .messages
            .get_mut(conversation_id)
            .ok_or_else(|| PersistError::ConversationNotFound(conversation_id.to_string()))?;

        if let Some(last) = messages
            .last_mut()
            .filter(|m| m.id == message_id && m.role == MessageRole::Assistant)
        {
            last.content.push_str(delta);
            return Ok(());
        }

        if messages.iter().any(|m| m.id == message_id) {
            Err(PersistError::NotAppendable(message_id.to_string()))
        } else {
            Err(PersistError::MessageNotFound(message_id.to_string()))
        }
    }

    async fn get_messages(&self, conversation_id: &str) -> Result<Vec<DBMessage>> {
        let inner = self.read()?;
        let mut messages = inner
            .messages
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| PersistError::ConversationNotFound(conversation_id.to_string()))?;

        // Stable: equal timestamps keep insertion order
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    fn try_begin_turn(&self, conversation_id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        if !inner.conversations.contains_key(conversation_id) {
            return Err(PersistError::ConversationNotFound(conversation_id.to_string()));
        }
        Ok(inner.active_turns.insert(conversation_id.to_string()))
    }

    fn end_turn(&self, conversation_id: &str) {
        match self.inner.write() {
            Ok(mut inner) => {
                inner.active_turns.remove(conversation_id);
            }
            Err(e) => tracing::warn!(conversation_id, error = %e, "failed to clear turn mark"),
        }
    }

    fn turn_in_progress(&self, conversation_id: &str) -> bool {
        self.inner
            .read()
            .map(|inner| inner.active_turns.contains(conversation_id))
            .unwrap_or(false)
    }
}
