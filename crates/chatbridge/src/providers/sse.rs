//! Server-sent events framing for streamed chat completions.
//!
//! Network chunks do not respect line or UTF-8 boundaries, so bytes are buffered
//! until a full line is available and only complete lines are decoded.

use crate::errors::{ChatError, ChatResult};

/// A parsed SSE event
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every event completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> ChatResult<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = std::str::from_utf8(&line)
                .map_err(|e| ChatError::Stream(format!("Invalid UTF-8 in event stream: {}", e)))?;
            if let Some(event) = parse_line(line.trim_end_matches(|c| c == '\n' || c == '\r')) {
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Flush a trailing line that was not newline terminated
    pub fn flush(&mut self) -> ChatResult<Option<SseEvent>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let remaining = std::mem::take(&mut self.buffer);
        let line = String::from_utf8(remaining)
            .map_err(|e| ChatError::Stream(format!("Invalid UTF-8 in event stream: {}", e)))?;
        Ok(parse_line(line.trim()))
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    // blank lines separate events, ':' starts a comment, and event:/id:/retry: are not used
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        Some(SseEvent::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}
