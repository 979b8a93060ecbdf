use std::fmt::Display;
use std::pin::Pin;

use anyhow::Result;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer_utils::{CircularLineBuffer, LineDecoder, LineOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Message {
        content: String,
    },

    Done {
        #[serde(skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
}

/// One `data:` envelope of a chat-completions stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Some providers report mid-stream failures inline instead of via status code
    #[serde(default)]
    pub error: Option<ProviderError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: Option<Delta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub code: Option<serde_json::Value>,
    pub message: String,
}

impl ChatStreamChunk {
    /// Text carried by the first choice's delta, if any
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.as_ref())
            .and_then(|d| d.content.as_deref())
            .filter(|c| !c.is_empty())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_deref())
    }
}

/// Why decoding stopped without reaching the sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed stream payload: {0}")]
    Malformed(String),

    #[error("stream line is not valid UTF-8")]
    InvalidUtf8,

    #[error("provider reported an error: {message}")]
    Provider { message: String },

    #[error("stream transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionReason {
    /// `[DONE]` was received
    Sentinel,
    /// Input ran out before a sentinel arrived
    EndOfStream,
    Failed(DecodeError),
}

/// Final state handed to [`StreamSink::on_complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub reason: CompletionReason,
    pub fragments: usize,
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        !matches!(self.reason, CompletionReason::Failed(_))
    }

    pub fn error(&self) -> Option<&DecodeError> {
        match &self.reason {
            CompletionReason::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Receiver for decoded fragments.
///
/// `on_complete` is called exactly once, after the last `on_fragment`,
/// whether the stream ended cleanly or not. Callbacks run on the decoding
/// task; marshal them elsewhere if the receiving state is owned by another thread.
pub trait StreamSink {
    fn on_fragment(&mut self, text: &str);

    fn on_complete(&mut self, completion: &Completion);
}

/// [`StreamSink`] built from a pair of closures.
pub struct FnSink<F, C> {
    on_fragment: F,
    on_complete: C,
}

impl<F, C> FnSink<F, C>
where
    F: FnMut(&str),
    C: FnMut(&Completion),
{
    pub fn new(on_fragment: F, on_complete: C) -> Self {
        Self { on_fragment, on_complete }
    }
}

impl<F, C> StreamSink for FnSink<F, C>
where
    F: FnMut(&str),
    C: FnMut(&Completion),
{
    fn on_fragment(&mut self, text: &str) {
        (self.on_fragment)(text)
    }

    fn on_complete(&mut self, completion: &Completion) {
        (self.on_complete)(completion)
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Adapt a chat-completions HTTP response into a stream of [`StreamEvent`]s.
pub fn parse_chat_sse_stream(response: Response) -> EventStream {
    parse_sse_bytes(response.bytes_stream())
}

/// Decode any chunked byte stream carrying `data:` lines.
///
/// Yields `Message` per fragment, then either `Done` or a single error
/// wrapping the [`DecodeError`] that stopped decoding.
pub fn parse_sse_bytes<S, E>(bytes: S) -> EventStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer = CircularLineBuffer::with_capacity(4096);
        let mut decoder = LineDecoder::new();

        'read: while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(&bytes);

                    while let Some(line_result) = buffer.next_line() {
                        match line_result {
                            Ok(line) => match decoder.push_line(&line) {
                                LineOutcome::Fragment(content) => {
                                    yield Ok(StreamEvent::Message { content });
                                }
                                LineOutcome::Skip => {}
                                LineOutcome::Finished => break 'read,
                            },
                            Err(e) => {
                                decoder.fail(e);
                                break 'read;
                            }
                        }
                    }
                }
                Err(e) => {
                    decoder.fail(DecodeError::Transport(e.to_string()));
                    break;
                }
            }
        }

        if !decoder.is_finished() {
            match buffer.take_remainder() {
                Some(Ok(line)) => {
                    if let LineOutcome::Fragment(content) = decoder.push_line(&line) {
                        yield Ok(StreamEvent::Message { content });
                    }
                }
                Some(Err(e)) => decoder.fail(e),
                None => {}
            }
        }

        let completion = decoder.into_completion();
        tracing::debug!(
            fragments = completion.fragments,
            reason = ?completion.reason,
            "chat stream finished"
        );

        match completion.reason {
            CompletionReason::Failed(e) => yield Err(anyhow::Error::new(e)),
            _ => yield Ok(StreamEvent::Done { finish_reason: completion.finish_reason }),
        }
    })
}
