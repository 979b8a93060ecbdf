use config::{Config as ConfigLoader, ConfigError, Environment, File};
use murmur_llm::{ChatOptions, ChatProviderConfig, SpeechConfig, VoiceSelection, DEFAULT_MODEL};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    #[serde(default)]
    pub speech: SpeechSection,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub llm_api_key: String,
    #[serde(default)]
    pub google_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeechSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub voice: VoiceSelection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. MURMUR_<SECTION>__<KEY> environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("MURMUR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        cfg.llm_api_key = std::env::var("LLM_API_KEY").map_err(|_| {
            ConfigError::Message("LLM_API_KEY environment variable is required".to_string())
        })?;
        cfg.google_api_key = std::env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        Ok(cfg)
    }

    /// Load config from a specific path, without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        ConfigLoader::builder()
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    pub fn chat_provider(&self) -> ChatProviderConfig {
        let provider = ChatProviderConfig::new(self.llm_api_key.clone());
        match &self.llm.base_url {
            Some(base_url) => provider.with_base_url(base_url.clone()),
            None => provider,
        }
    }

    pub fn chat_options(&self) -> ChatOptions {
        let mut options = ChatOptions::new();
        if let Some(temperature) = self.llm.temperature {
            options = options.temperature(temperature);
        }
        if let Some(max_tokens) = self.llm.max_tokens {
            options = options.max_tokens(max_tokens);
        }
        options
    }

    /// Speech settings, or `None` when no Google API key is configured
    pub fn speech_provider(&self) -> Option<SpeechConfig> {
        let api_key = self.google_api_key.clone()?;
        let mut speech = SpeechConfig::new(api_key).with_voice(self.speech.voice.clone());
        speech.base_url = self.speech.base_url.clone();
        Some(speech)
    }
}
