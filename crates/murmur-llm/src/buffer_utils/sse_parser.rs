use std::fmt::Display;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::buffering::CircularLineBuffer;
use crate::streaming::{ChatStreamChunk, Completion, CompletionReason, DecodeError, StreamSink};

const DONE_MARKER: &str = "[DONE]";

/// SSE fields that carry nothing for chat completions
const IGNORED_FIELDS: &[&str] = &["event", "id", "retry"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// Blank line, keep-alive, or an envelope with no text
    Skip,
    Fragment(String),
    /// Decoding is over; further lines are ignored
    Finished,
}

/// Per-line state machine for a chat-completions event stream.
///
/// Once a terminal line is seen (sentinel, malformed payload, provider
/// error) every later call returns [`LineOutcome::Finished`].
#[derive(Debug, Default)]
pub struct LineDecoder {
    fragments: usize,
    finish_reason: Option<String>,
    terminal: Option<CompletionReason>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn push_line(&mut self, line: &str) -> LineOutcome {
        if self.is_finished() {
            return LineOutcome::Finished;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return LineOutcome::Skip;
        }

        // Comment lines double as keep-alives (": OPENROUTER PROCESSING")
        if line.starts_with(':') {
            tracing::trace!(line, "skipping keep-alive");
            return LineOutcome::Skip;
        }

        let payload = match split_field(line) {
            Some(("data", value)) => value,
            Some((field, _)) if IGNORED_FIELDS.contains(&field) => return LineOutcome::Skip,
            _ => {
                return self.terminate(CompletionReason::Failed(DecodeError::Malformed(
                    format!("unexpected stream line: {line}"),
                )));
            }
        };

        if payload.trim() == DONE_MARKER {
            return self.terminate(CompletionReason::Sentinel);
        }

        let chunk: ChatStreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                return self.terminate(CompletionReason::Failed(DecodeError::Malformed(
                    e.to_string(),
                )));
            }
        };

        if let Some(error) = chunk.error {
            return self.terminate(CompletionReason::Failed(DecodeError::Provider {
                message: error.message,
            }));
        }

        if let Some(reason) = chunk.finish_reason() {
            self.finish_reason = Some(reason.to_string());
        }

        match chunk.content() {
            Some(content) => {
                self.fragments += 1;
                LineOutcome::Fragment(content.to_string())
            }
            None => LineOutcome::Skip,
        }
    }

    /// Record a failure coming from outside the line protocol (transport, UTF-8).
    /// Has no effect once the decoder is finished.
    pub fn fail(&mut self, error: DecodeError) {
        if self.terminal.is_none() {
            self.terminal = Some(CompletionReason::Failed(error));
        }
    }

    pub fn into_completion(self) -> Completion {
        Completion {
            reason: self.terminal.unwrap_or(CompletionReason::EndOfStream),
            fragments: self.fragments,
            finish_reason: self.finish_reason,
        }
    }

    fn terminate(&mut self, reason: CompletionReason) -> LineOutcome {
        if let CompletionReason::Failed(e) = &reason {
            tracing::warn!(error = %e, "stopping chat stream decode");
        }
        self.terminal = Some(reason);
        LineOutcome::Finished
    }
}

/// Split `field: value`, dropping the single optional space after the colon.
fn split_field(line: &str) -> Option<(&str, &str)> {
    let (field, value) = line.split_once(':')?;
    Some((field, value.strip_prefix(' ').unwrap_or(value)))
}

/// Decode a sequence of already-split lines into `sink`.
pub fn decode_lines<I, S, K>(lines: I, sink: &mut K) -> Completion
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    K: StreamSink + ?Sized,
{
    let mut decoder = LineDecoder::new();

    for line in lines {
        if !feed(&mut decoder, line.as_ref(), sink) {
            break;
        }
    }

    let completion = decoder.into_completion();
    sink.on_complete(&completion);
    completion
}

/// Decode a chunked byte stream into `sink`, reassembling lines that are
/// split across chunks.
pub async fn decode_byte_stream<St, E, K>(stream: St, sink: &mut K) -> Completion
where
    St: Stream<Item = Result<Bytes, E>>,
    E: Display,
    K: StreamSink + ?Sized,
{
    let mut stream = std::pin::pin!(stream);
    let mut buffer = CircularLineBuffer::with_capacity(4096);
    let mut decoder = LineDecoder::new();

    'read: while let Some(chunk_result) = stream.next().await {
        let bytes = match chunk_result {
            Ok(bytes) => bytes,
            Err(e) => {
                decoder.fail(DecodeError::Transport(e.to_string()));
                break;
            }
        };

        buffer.extend(&bytes);
        while let Some(line_result) = buffer.next_line() {
            match line_result {
                Ok(line) => {
                    if !feed(&mut decoder, &line, sink) {
                        break 'read;
                    }
                }
                Err(e) => {
                    decoder.fail(e);
                    break 'read;
                }
            }
        }
    }

    if !decoder.is_finished() {
        match buffer.take_remainder() {
            Some(Ok(line)) => {
                feed(&mut decoder, &line, sink);
            }
            Some(Err(e)) => decoder.fail(e),
            None => {}
        }
    }

    let completion = decoder.into_completion();
    sink.on_complete(&completion);
    completion
}

/// Returns false once decoding should stop
fn feed<K: StreamSink + ?Sized>(decoder: &mut LineDecoder, line: &str, sink: &mut K) -> bool {
    match decoder.push_line(line) {
        LineOutcome::Fragment(text) => {
            sink.on_fragment(&text);
            true
        }
        LineOutcome::Skip => true,
        LineOutcome::Finished => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(content: &str) -> String {
        format!(
            r#"data: {{"id":"gen-1","choices":[{{"delta":{{"content":{}}}}}]}}"#,
            serde_json::to_string(content).unwrap()
        )
    }

    #[test]
    fn test_fragment_line() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push_line(&data("Hel")), LineOutcome::Fragment("Hel".into()));
        assert_eq!(decoder.fragments(), 1);
    }

    #[test]
    fn test_prefix_without_space() {
        let mut decoder = LineDecoder::new();
        let line = r#"data:{"id":"x","choices":[{"delta":{"content":"a"}}]}"#;
        assert_eq!(decoder.push_line(line), LineOutcome::Fragment("a".into()));
    }

    #[test]
    fn test_keep_alive_and_blank() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push_line(": OPENROUTER PROCESSING"), LineOutcome::Skip);
        assert_eq!(decoder.push_line(""), LineOutcome::Skip);
        assert_eq!(decoder.push_line("\r"), LineOutcome::Skip);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn test_other_fields_ignored() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push_line("event: message"), LineOutcome::Skip);
        assert_eq!(decoder.push_line("id: 42"), LineOutcome::Skip);
        assert_eq!(decoder.push_line("retry: 1000"), LineOutcome::Skip);
    }

    #[test]
    fn test_sentinel_is_terminal() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push_line("data: [DONE]"), LineOutcome::Finished);
        assert_eq!(decoder.push_line(&data("late")), LineOutcome::Finished);
        let completion = decoder.into_completion();
        assert_eq!(completion.reason, CompletionReason::Sentinel);
        assert_eq!(completion.fragments, 0);
    }

    #[test]
    fn test_line_without_field_is_malformed() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push_line("garbage"), LineOutcome::Finished);
        assert!(matches!(
            decoder.into_completion().reason,
            CompletionReason::Failed(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_provider_error_envelope() {
        let mut decoder = LineDecoder::new();
        let line = r#"data: {"id":"x","error":{"code":429,"message":"Rate limited"}}"#;
        assert_eq!(decoder.push_line(line), LineOutcome::Finished);
        assert_eq!(
            decoder.into_completion().reason,
            CompletionReason::Failed(DecodeError::Provider { message: "Rate limited".into() })
        );
    }

    #[test]
    fn test_finish_reason_recorded() {
        let mut decoder = LineDecoder::new();
        let line = r#"data: {"id":"x","choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(decoder.push_line(line), LineOutcome::Skip);
        assert_eq!(decoder.into_completion().finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_fail_after_finish_keeps_first_reason() {
        let mut decoder = LineDecoder::new();
        decoder.push_line("data: [DONE]");
        decoder.fail(DecodeError::Transport("reset".into()));
        assert_eq!(decoder.into_completion().reason, CompletionReason::Sentinel);
    }
}
