use serde_json::Value;

use crate::events::{ChatStreamEvent, FinishReason};

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a blank line closes a frame, so multi-byte
/// characters split across network chunks decode intact.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: Vec<u8>,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatStreamEvent> {
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));
        let mut events = Vec::new();

        while let Some(split) = find_frame_end(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..split + 2).collect();
            events.extend(parse_frame(&frame[..split]));
        }

        events
    }

    /// Parse whatever is left in the buffer as a final frame.
    pub fn finish(&mut self) -> Vec<ChatStreamEvent> {
        let frame = std::mem::take(&mut self.buffer);
        parse_frame(&frame)
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<ChatStreamEvent> {
        let mut parser = Self::default();
        let mut events = parser.feed(input.as_bytes());
        events.extend(parser.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_frame_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn parse_frame(frame: &[u8]) -> Vec<ChatStreamEvent> {
    let frame = String::from_utf8_lossy(frame);
    let Some(payload) = extract_data_payload(&frame) else {
        return Vec::new();
    };
    if payload == DONE_SENTINEL {
        return vec![ChatStreamEvent::Done];
    }

    match serde_json::from_str::<Value>(&payload) {
        Ok(value) => map_event(&value),
        Err(error) => {
            tracing::debug!(%error, "skipping non-JSON SSE frame");
            Vec::new()
        }
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_event(value: &Value) -> Vec<ChatStreamEvent> {
    if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
        let code = error.get("code").and_then(value_as_string);
        let message = error
            .get("message")
            .and_then(|value| value.as_str())
            .map(ToString::to_string);
        return vec![ChatStreamEvent::Error { code, message }];
    }

    let Some(choice) = value
        .get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|choices| choices.first())
    else {
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(content) = choice
        .get("delta")
        .and_then(|delta| delta.get("content"))
        .and_then(|value| value.as_str())
        .filter(|content| !content.is_empty())
    {
        events.push(ChatStreamEvent::ContentDelta {
            content: content.to_owned(),
        });
    }
    if let Some(reason) = choice.get("finish_reason").and_then(|value| value.as_str()) {
        events.push(ChatStreamEvent::Finished {
            reason: FinishReason::parse(reason),
        });
    }
    events
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
