pub mod accumulator;
pub mod context;
pub mod error;
pub mod session;
pub mod templates;
pub mod title;
pub mod voice;

pub use accumulator::TurnAccumulator;
pub use error::ChatError;
pub use session::{ChatSession, TurnEvent, TurnOutcome};
pub use title::TitleGenerator;
pub use voice::{
    AudioPlayer, SpeechRecognizer, TranscriptStream, VoiceLoop, VoicePhase, VoiceSettings,
    VoiceTurn, VoiceTurnOutcome,
};
