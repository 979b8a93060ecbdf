use std::sync::Arc;

use anyhow::{bail, Context, Result};
use murmur_llm::{ChatClient, ChatRequest};
use murmur_persist::PersistenceClient;

use crate::context::title_context;

const QUOTES: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Asks the model for a short conversation title and stores it
#[derive(Clone)]
pub struct TitleGenerator {
    client: Arc<dyn ChatClient>,
    store: Arc<dyn PersistenceClient>,
    model: String,
}

impl TitleGenerator {
    pub fn new(
        client: Arc<dyn ChatClient>,
        store: Arc<dyn PersistenceClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            model: model.into(),
        }
    }

    /// Generate a title from the first exchange
    pub async fn generate(&self, user_text: &str, reply: &str) -> Result<String> {
        let request = ChatRequest::new(self.model.clone(), title_context(user_text, reply));
        let response = self
            .client
            .chat(request)
            .await
            .context("Title request failed")?;

        let title = clean_title(response.content.as_deref().unwrap_or_default());
        if title.is_empty() {
            bail!("Model returned an empty title");
        }
        Ok(title)
    }

    /// Generate and store the title. Failures are logged and leave the
    /// conversation untitled.
    pub async fn apply(&self, conversation_id: &str, user_text: &str, reply: &str) {
        let title = match self.generate(user_text, reply).await {
            Ok(title) => title,
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "Title generation failed");
                return;
            }
        };

        match self.store.set_title(conversation_id, title.clone()).await {
            Ok(()) => tracing::info!(conversation_id, title = %title, "Conversation titled"),
            Err(e) => tracing::warn!(conversation_id, error = %e, "Failed to store title"),
        }
    }
}

/// Trim whitespace and any surrounding quotes the model added anyway
pub fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(QUOTES)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
