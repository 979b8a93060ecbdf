use std::time::{Duration, Instant};

/// Collects the fragments of one assistant reply and tracks stream timing
pub struct TurnAccumulator {
    text: String,
    fragments: usize,
    started_at: Instant,
    first_fragment: Option<Duration>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            fragments: 0,
            started_at: Instant::now(),
            first_fragment: None,
        }
    }

    pub fn push(&mut self, fragment: &str) {
        if self.first_fragment.is_none() {
            let latency = self.started_at.elapsed();
            tracing::debug!(latency_ms = latency.as_millis() as u64, "First fragment received");
            self.first_fragment = Some(latency);
        }
        self.text.push_str(fragment);
        self.fragments += 1;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Time from turn start to the first fragment, if any arrived
    pub fn first_fragment_latency(&self) -> Option<Duration> {
        self.first_fragment
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl Default for TurnAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
