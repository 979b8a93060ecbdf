use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::{timeout_at, Instant};

/// Decides when the speaker has finished an utterance.
///
/// Every transcript update that is non-empty and differs from the previous
/// one pushes the deadline out by `timeout`. Repeats and blanks leave it alone.
#[derive(Debug, Clone, Copy)]
pub struct SilenceDetector {
    timeout: Duration,
}

impl SilenceDetector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for an utterance followed by silence.
    ///
    /// Returns the last transcript once no new text has arrived for `timeout`,
    /// or as soon as the stream ends. Returns `None` if the stream ends before
    /// anything was heard.
    pub async fn wait_for_utterance<S>(&self, transcripts: &mut S) -> Option<String>
    where
        S: Stream<Item = String> + Unpin,
    {
        let mut heard = String::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let next = match deadline {
                None => transcripts.next().await,
                Some(at) => match timeout_at(at, transcripts.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        tracing::debug!(chars = heard.len(), "Silence detected");
                        return Some(heard);
                    }
                },
            };

            let Some(update) = next else {
                return if heard.is_empty() { None } else { Some(heard) };
            };

            let update = update.trim();
            if update.is_empty() || update == heard {
                continue;
            }

            heard = update.to_string();
            deadline = Some(Instant::now() + self.timeout);
        }
    }
}

impl Default for SilenceDetector {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}
