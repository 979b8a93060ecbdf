//! Hands-free voice mode: listen, wait for silence, send, speak the reply.
//!
//! Microphone capture, speech recognition and audio output live on the
//! platform side and are reached through [`SpeechRecognizer`] and
//! [`AudioPlayer`].

pub mod levels;
pub mod silence;
pub mod turn_loop;

use std::fmt;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

pub use levels::{power_to_linear, rms};
pub use silence::SilenceDetector;
pub use turn_loop::{VoiceLoop, VoiceTurn, VoiceTurnOutcome};

/// Partial transcriptions of the current utterance, each one the full text so far
pub type TranscriptStream = Pin<Box<dyn Stream<Item = String> + Send>>;

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Request microphone and speech-recognition permission
    async fn authorize(&self) -> bool;

    async fn start(&self) -> anyhow::Result<TranscriptStream>;

    async fn stop(&self);
}

#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play encoded audio; resolves once playback has finished
    async fn play(&self, audio: Vec<u8>) -> anyhow::Result<()>;

    async fn stop(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoicePhase {
    #[default]
    Idle,
    Listening,
    SilenceDetected,
    Sending,
    AwaitingResponse,
    Speaking,
}

impl fmt::Display for VoicePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VoicePhase::Idle => "idle",
            VoicePhase::Listening => "listening",
            VoicePhase::SilenceDetected => "silence detected",
            VoicePhase::Sending => "sending",
            VoicePhase::AwaitingResponse => "awaiting response",
            VoicePhase::Speaking => "speaking",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSettings {
    /// Quiet period after the last transcript change that ends an utterance
    pub silence_timeout: Duration,
    /// Pause between finishing a reply and listening again
    pub resume_delay: Duration,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            silence_timeout: Duration::from_millis(1500),
            resume_delay: Duration::from_secs(1),
        }
    }
}
