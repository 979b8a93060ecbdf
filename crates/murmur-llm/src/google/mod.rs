mod client;

pub use client::{GoogleTtsClient, VoiceSelection, DEFAULT_TTS_BASE};
