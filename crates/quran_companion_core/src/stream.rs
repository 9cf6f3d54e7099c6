//! crates/quran_companion_core/src/stream.rs
//!
//! Incremental decoder for server-sent chat completion streams.
//!
//! The transport hands over arbitrary byte chunks. A chunk may end in the
//! middle of a line or in the middle of a multi-byte character, so bytes are
//! held back until a full line (terminated by `\n`) is available. Each line
//! of the form `data: <payload>` is then classified; every other line is
//! ignored.

use serde::Deserialize;

/// Marker that opens every server event line.
pub const EVENT_PREFIX: &str = "data: ";

/// Payload sent by the server when it has no more deltas.
pub const DONE_SENTINEL: &str = "[DONE]";

/// How a single line of the stream was interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Not an event line, or an event without text (role announcements, keepalives).
    Ignored,
    /// The termination sentinel. It carries no data.
    Done,
    /// A non-empty text fragment to append to the reply.
    Delta(String),
    /// The payload was not a JSON object of the expected shape.
    Malformed(String),
}

#[derive(Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Classifies one complete line (without its trailing newline).
pub fn parse_event_line(line: &str) -> StreamEvent {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(payload) = line.strip_prefix(EVENT_PREFIX) else {
        return StreamEvent::Ignored;
    };
    let payload = payload.trim();
    if payload == DONE_SENTINEL {
        return StreamEvent::Done;
    }

    match serde_json::from_str::<CompletionChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map_or(StreamEvent::Ignored, StreamEvent::Delta),
        Err(e) => StreamEvent::Malformed(e.to_string()),
    }
}

/// Longest line kept while waiting for its newline. Anything longer is
/// reported once as malformed and skipped up to the next newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Splits a chunked event stream into classified lines.
///
/// The ingester only owns the bytes of the line not yet terminated; the reply
/// text itself is assembled by whoever consumes the `Delta` events.
#[derive(Debug, Default)]
pub struct DeltaIngester {
    pending: Vec<u8>,
    discarding: bool,
}

impl DeltaIngester {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes one transport chunk and returns the events of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let scan_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        let mut search_from = scan_from;
        while let Some(offset) = self.pending[search_from..].iter().position(|&b| b == b'\n') {
            let newline = search_from + offset;
            if self.discarding {
                // Tail of an oversized line, already reported.
                self.discarding = false;
            } else if newline - consumed > MAX_LINE_BYTES {
                events.push(oversized_line());
            } else {
                let line = String::from_utf8_lossy(&self.pending[consumed..newline]);
                events.push(parse_event_line(&line));
            }
            consumed = newline + 1;
            search_from = consumed;
        }
        self.pending.drain(..consumed);

        if self.pending.len() > MAX_LINE_BYTES {
            self.pending.clear();
            if !self.discarding {
                self.discarding = true;
                events.push(oversized_line());
            }
        } else if self.discarding {
            self.pending.clear();
        }
        events
    }

    /// Flushes a final line that arrived without a terminating newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let rest = std::mem::take(&mut self.pending);
        if std::mem::take(&mut self.discarding) || rest.is_empty() {
            return Vec::new();
        }
        vec![parse_event_line(&String::from_utf8_lossy(&rest))]
    }
}

fn oversized_line() -> StreamEvent {
    StreamEvent::Malformed(format!("line longer than {} bytes", MAX_LINE_BYTES))
}

/// Text fragments contained in a batch of events, in order.
pub fn deltas(events: Vec<StreamEvent>) -> Vec<String> {
    events
        .into_iter()
        .filter_map(|event| match event {
            StreamEvent::Delta(text) => Some(text),
            _ => None,
        })
        .collect()
}
