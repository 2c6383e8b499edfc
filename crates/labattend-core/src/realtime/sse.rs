//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers partial lines and
//! emits a frame at every blank line that follows at least one `data:` line.

use serde_json::Value;

use super::event::RealtimeEvent;

/// One dispatched SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the last `event:` line, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl SseFrame {
    /// Interpret the frame as a realtime event.
    ///
    /// The payload is normally a JSON object carrying its own `type`; a named
    /// `event:` (other than the default `message`) overrides it. A payload
    /// without a type is accepted only when the frame is named.
    pub fn into_event(self) -> Option<RealtimeEvent> {
        let named = self.event.filter(|name| name != "message");
        let value = match serde_json::from_str::<Value>(&self.data) {
            Ok(value) => value,
            Err(_) => Value::String(self.data),
        };

        let mut event = match serde_json::from_value::<RealtimeEvent>(value.clone()) {
            Ok(event) => event,
            Err(_) => RealtimeEvent::new(named.clone()?, value),
        };
        if let Some(name) = named {
            event.event_type = name;
        }
        Some(event)
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the frames it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.process_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id and retry are not used for reconnection here
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}
