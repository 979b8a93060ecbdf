pub mod types;
pub mod traits;
pub mod streaming;
pub mod buffer_utils;
pub mod openai;
pub mod google;
pub mod config;

pub use traits::{
    ChatClient,
    SpeechClient,
    ChatRequest, ChatResponse, ChatOptions,
    EventStream,
    TokenUsage,
};

pub use streaming::{StreamEvent, StreamSink, FnSink, Completion, CompletionReason, DecodeError};
pub use streaming::{parse_chat_sse_stream, parse_sse_bytes};
pub use buffer_utils::{CircularLineBuffer, LineDecoder, LineOutcome, decode_lines, decode_byte_stream};
pub use openai::{OpenAIClient, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use google::{GoogleTtsClient, VoiceSelection, DEFAULT_TTS_BASE};
pub use config::{ChatProviderConfig, SpeechConfig, ClientFactory};
pub use types::Message;
