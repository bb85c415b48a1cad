//! Incremental `text/event-stream` decoder.

use std::time::Duration;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    /// Event name; `"message"` when the server sent none.
    pub event: String,
    pub data: String,
    pub id: Option<String>,
    pub retry: Option<Duration>,
}

/// Feed arbitrary byte chunks in, get complete events out.
///
/// Lines may be split across chunks, and LF, CRLF and CR all end a line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    pending_cr: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<Duration>,
    last_event_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last `id:` seen, kept across events for reconnection.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' if self.pending_cr => {
                    self.pending_cr = false;
                }
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.end_line(&mut events);
                    self.pending_cr = true;
                }
                _ => {
                    self.pending_cr = false;
                    self.buffer.push(byte);
                }
            }
        }
        events
    }

    /// Flush at end of stream. A trailing event without its blank line is
    /// discarded, as browsers do.
    pub fn finish(&mut self) {
        self.buffer.clear();
        self.reset_event();
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let line = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_str(), ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if let Some(id) = &self.id {
            self.last_event_id = Some(id.clone());
        }
        if self.data.is_empty() {
            self.reset_event();
            return None;
        }
        let event = SseEvent {
            event: self
                .event
                .take()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "message".to_string()),
            data: self.data.join("\n"),
            id: self.id.take(),
            retry: self.retry.take(),
        };
        self.reset_event();
        Some(event)
    }

    fn reset_event(&mut self) {
        self.event = None;
        self.data.clear();
        self.id = None;
        self.retry = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_named_events_across_chunks() {
        let mut decoder = SseDecoder::new();
        let mut events = decoder.feed(b"event: status\nda");
        assert!(events.is_empty());
        events.extend(decoder.feed(b"ta: {\"status\":\"completed\"}\n\n"));
        assert_eq!(
            events,
            vec![SseEvent {
                event: "status".into(),
                data: "{\"status\":\"completed\"}".into(),
                id: None,
                retry: None,
            }]
        );
    }

    #[test]
    fn joins_multiline_data_and_defaults_event_name() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: one\ndata:two\n\n");
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn accepts_crlf_split_between_chunks() {
        let mut decoder = SseDecoder::new();
        let mut events = decoder.feed(b"event: error\r");
        events.extend(decoder.feed(b"\ndata: boom\r\n\r\n"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "error");
        assert_eq!(events[0].data, "boom");
    }

    #[test]
    fn ignores_comments_and_empty_events() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keepalive\n\nevent: status\n\nid: 7\nretry: 1500\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].retry, Some(Duration::from_millis(1500)));
        assert_eq!(events[0].event, "message");
        assert_eq!(decoder.last_event_id(), Some("7"));
    }

    #[test]
    fn unterminated_event_is_dropped_on_finish() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: partial\n").is_empty());
        decoder.finish();
        assert!(decoder.feed(b"\n").is_empty());
    }
}
