// Google Cloud Text-to-Speech client

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::traits::SpeechClient;

pub const DEFAULT_TTS_BASE: &str = "https://texttospeech.googleapis.com/v1";

/// Voice and encoding used for every synthesis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSelection {
    pub language_code: String,
    pub name: String,
    pub audio_encoding: String,
}

impl Default for VoiceSelection {
    fn default() -> Self {
        Self {
            language_code: "en-US".to_string(),
            name: "en-US-Chirp3-HD-Achernar".to_string(),
            audio_encoding: "MP3".to_string(),
        }
    }
}

pub struct GoogleTtsClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    voice: VoiceSelection,
}

impl GoogleTtsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            api_key: api_key.into(),
            base_url: DEFAULT_TTS_BASE.to_string(),
            voice: VoiceSelection::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_voice(mut self, voice: VoiceSelection) -> Self {
        self.voice = voice;
        self
    }

    pub fn voice(&self) -> &VoiceSelection {
        &self.voice
    }

    fn build_request<'a>(&'a self, text: &'a str) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceParams {
                language_code: &self.voice.language_code,
                name: &self.voice.name,
            },
            audio_config: AudioConfig {
                audio_encoding: &self.voice.audio_encoding,
            },
        }
    }
}

#[async_trait]
impl SpeechClient for GoogleTtsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let body = self.build_request(text);

        let response = self
            .http_client
            .post(format!("{}/text:synthesize", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Failed to send TTS request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("TTS API error ({}): {}", status, error_text);
        }

        let raw: SynthesizeResponse = response
            .json()
            .await
            .context("Failed to parse TTS response")?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(raw.audio_content.as_bytes())
            .context("TTS audioContent is not valid base64")?;

        tracing::debug!(chars = text.len(), bytes = audio.len(), "synthesized speech");
        Ok(audio)
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceParams<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceParams<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}
