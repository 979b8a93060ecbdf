use std::future::Future;
use std::sync::Arc;

use murmur_llm::SpeechClient;
use tokio::sync::watch;

use super::{AudioPlayer, SilenceDetector, SpeechRecognizer, VoicePhase, VoiceSettings};
use crate::error::Result;
use crate::session::ChatSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceTurn {
    pub transcript: String,
    pub reply: String,
    /// Whether the reply was synthesized and played to the end
    pub spoken: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceTurnOutcome {
    PermissionDenied,
    NothingHeard,
    Completed(VoiceTurn),
}

/// Drives spoken turns against a [`ChatSession`]
pub struct VoiceLoop {
    session: Arc<ChatSession>,
    recognizer: Arc<dyn SpeechRecognizer>,
    speech: Arc<dyn SpeechClient>,
    player: Arc<dyn AudioPlayer>,
    settings: VoiceSettings,
    phase: watch::Sender<VoicePhase>,
}

impl VoiceLoop {
    pub fn new(
        session: Arc<ChatSession>,
        recognizer: Arc<dyn SpeechRecognizer>,
        speech: Arc<dyn SpeechClient>,
        player: Arc<dyn AudioPlayer>,
    ) -> Self {
        let (phase, _) = watch::channel(VoicePhase::Idle);
        Self {
            session,
            recognizer,
            speech,
            player,
            settings: VoiceSettings::default(),
            phase,
        }
    }

    pub fn with_settings(mut self, settings: VoiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<VoicePhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> VoicePhase {
        *self.phase.borrow()
    }

    fn set_phase(&self, phase: VoicePhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            tracing::debug!(from = %previous, to = %phase, "Voice phase changed");
        }
    }

    /// Run one listen, send, speak cycle. Always ends in `Idle`.
    pub async fn run_turn(&self) -> Result<VoiceTurnOutcome> {
        let outcome = self.turn().await;
        self.set_phase(VoicePhase::Idle);
        outcome
    }

    async fn turn(&self) -> Result<VoiceTurnOutcome> {
        if !self.recognizer.authorize().await {
            tracing::warn!("Speech recognition permission denied");
            return Ok(VoiceTurnOutcome::PermissionDenied);
        }

        self.set_phase(VoicePhase::Listening);
        let mut transcripts = self.recognizer.start().await?;
        let heard = SilenceDetector::new(self.settings.silence_timeout)
            .wait_for_utterance(&mut transcripts)
            .await;
        self.recognizer.stop().await;
        drop(transcripts);

        let Some(transcript) = heard else {
            tracing::debug!("Recognition ended without speech");
            return Ok(VoiceTurnOutcome::NothingHeard);
        };

        self.set_phase(VoicePhase::SilenceDetected);
        tracing::info!(transcript = %transcript, "Utterance captured");

        self.set_phase(VoicePhase::Sending);
        let outcome = self.session.send_message(&transcript).await?;

        self.set_phase(VoicePhase::AwaitingResponse);
        let spoken = self.speak(&outcome.text).await;

        Ok(VoiceTurnOutcome::Completed(VoiceTurn {
            transcript,
            reply: outcome.text,
            spoken,
        }))
    }

    async fn speak(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            tracing::debug!("Empty reply; nothing to speak");
            return false;
        }

        let audio = match self.speech.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "Speech synthesis failed");
                return false;
            }
        };

        self.set_phase(VoicePhase::Speaking);
        match self.player.play(audio).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Audio playback failed");
                false
            }
        }
    }

    /// Keep taking turns until `shutdown` resolves or permission is denied
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("Voice mode started");

        let result = loop {
            let turn = tokio::select! {
                _ = &mut shutdown => break Ok(()),
                turn = self.run_turn() => turn,
            };

            match turn {
                Ok(VoiceTurnOutcome::PermissionDenied) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }

            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                _ = tokio::time::sleep(self.settings.resume_delay) => {}
            }
        };

        self.stop().await;
        tracing::info!("Voice mode stopped");
        result
    }

    /// Halt recognition and playback and return to `Idle`
    pub async fn stop(&self) {
        self.recognizer.stop().await;
        self.player.stop().await;
        self.set_phase(VoicePhase::Idle);
    }
}
