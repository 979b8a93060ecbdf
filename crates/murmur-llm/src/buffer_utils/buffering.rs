use std::collections::VecDeque;

use crate::streaming::DecodeError;

/// Circular buffer for line-based parsing of chunked bodies
///
/// Network chunks do not respect line boundaries; bytes are held here until
/// a full `\n`-terminated line is available.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Extract next line (up to \n) from buffer, without its line terminator
    /// Returns None if no complete line is available
    pub fn next_line(&mut self) -> Option<Result<String, DecodeError>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(Self::decode(line_bytes))
    }

    /// Drain whatever is left once the body has ended (a last line with no `\n`)
    pub fn take_remainder(&mut self) -> Option<Result<String, DecodeError>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line_bytes: Vec<u8> = self.buffer.drain(..).collect();
        Some(Self::decode(line_bytes))
    }

    fn decode(line_bytes: Vec<u8>) -> Result<String, DecodeError> {
        let line = String::from_utf8(line_bytes).map_err(|_| DecodeError::InvalidUtf8)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
