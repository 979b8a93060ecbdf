// Configuration layer for client creation
// Provides a factory for building chat and speech clients from serde config

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::google::{GoogleTtsClient, VoiceSelection};
use crate::openai::OpenAIClient;
use crate::traits::{ChatClient, SpeechClient};

/// Configuration for an OpenAI-compatible chat-completions provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatProviderConfig {
    pub api_key: String,
    /// Base URL for the API (optional, defaults to https://openrouter.ai/api/v1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ChatProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Configuration for the text-to-speech provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub voice: VoiceSelection,
}

impl SpeechConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            voice: VoiceSelection::default(),
        }
    }

    pub fn with_voice(mut self, voice: VoiceSelection) -> Self {
        self.voice = voice;
        self
    }
}

/// Factory for creating clients from configuration
pub struct ClientFactory;

impl ClientFactory {
    pub fn create_chat_client(config: ChatProviderConfig) -> Result<Arc<dyn ChatClient>> {
        let mut client = OpenAIClient::new(config.api_key)?;
        if let Some(base_url) = config.base_url {
            client = client.with_base_url(base_url);
        }
        Ok(Arc::new(client))
    }

    pub fn create_speech_client(config: SpeechConfig) -> Result<Arc<dyn SpeechClient>> {
        let mut client = GoogleTtsClient::new(config.api_key)?.with_voice(config.voice);
        if let Some(base_url) = config.base_url {
            client = client.with_base_url(base_url);
        }
        Ok(Arc::new(client))
    }
}
