use super::observables::Observable;
use super::sse::SseEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// A chat message; never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: Sender::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Classified stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Message(ChatMessage),
    Status(String),
    Error(String),
    Observable(Observable),
}

impl StreamEvent {
    /// Decode a raw SSE event. Unknown names and undecodable payloads are
    /// logged and skipped.
    pub fn classify(event: &SseEvent) -> Option<Self> {
        let parsed = match event.event.as_str() {
            "json_message" => serde_json::from_str(&event.data)
                .map(StreamEvent::Message)
                .map_err(|e| e.to_string()),
            "status" => Ok(StreamEvent::Status(text_field(&event.data, &["status"]))),
            "error" => Ok(StreamEvent::Error(text_field(&event.data, &["error", "message"]))),
            "observable_update" => serde_json::from_str(&event.data)
                .map(StreamEvent::Observable)
                .map_err(|e| e.to_string()),
            "message" => legacy_message(&event.data),
            other => {
                warn!("Ignoring unknown stream event '{}'", other);
                return None;
            }
        };

        match parsed {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Skipping undecodable '{}' event: {}", event.event, e);
                None
            }
        }
    }
}

/// The payload's first string field among `keys`, a bare JSON string, or the
/// raw text.
fn text_field(data: &str, keys: &[&str]) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => keys
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
            .map(String::from)
            .unwrap_or_else(|| data.to_string()),
        _ => data.to_string(),
    }
}

/// Unnamed events: either a full chat message or `{"type": "message", "content": ...}`.
fn legacy_message(data: &str) -> Result<StreamEvent, String> {
    let value: Value = serde_json::from_str(data).map_err(|e| e.to_string())?;
    if let Ok(message) = serde_json::from_value::<ChatMessage>(value.clone()) {
        return Ok(StreamEvent::Message(message));
    }
    match (value.get("type").and_then(|t| t.as_str()), value.get("content")) {
        (Some("message"), Some(Value::String(content))) => Ok(StreamEvent::Message(ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            sender: Sender::Agent,
            content: content.clone(),
            timestamp: Utc::now(),
        })),
        _ => Err("not a chat message".to_string()),
    }
}

/// Append-only per-kind buffers of decoded events.
#[derive(Debug, Default, Clone)]
pub struct EventBuffers {
    pub messages: Vec<ChatMessage>,
    pub statuses: Vec<String>,
    pub errors: Vec<String>,
    pub observables: Vec<Observable>,
}

impl EventBuffers {
    pub fn push(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Message(m) => self.messages.push(m),
            StreamEvent::Status(s) => self.statuses.push(s),
            StreamEvent::Error(e) => self.errors.push(e),
            StreamEvent::Observable(o) => self.observables.push(o),
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.statuses.clear();
        self.errors.clear();
        self.observables.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse(event: &str, data: &str) -> SseEvent {
        SseEvent {
            event: event.to_string(),
            data: data.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn classifies_named_events() {
        let msg = StreamEvent::classify(&sse(
            "json_message",
            r#"{"id":"m1","sender":"agent","content":"hi","timestamp":"2026-01-01T00:00:00Z"}"#,
        ));
        assert!(matches!(msg, Some(StreamEvent::Message(m)) if m.id == "m1" && m.sender == Sender::Agent));

        assert_eq!(
            StreamEvent::classify(&sse("status", r#"{"status":"completed"}"#)),
            Some(StreamEvent::Status("completed".into()))
        );
        assert_eq!(
            StreamEvent::classify(&sse("status", "thinking")),
            Some(StreamEvent::Status("thinking".into()))
        );
        assert_eq!(
            StreamEvent::classify(&sse("error", r#"{"error":"model offline"}"#)),
            Some(StreamEvent::Error("model offline".into()))
        );

        let obs = StreamEvent::classify(&sse(
            "observable_update",
            r#"{"id":3,"parent_id":1,"agent":"a","name":"search","icon":"x"}"#,
        ));
        assert!(matches!(obs, Some(StreamEvent::Observable(o)) if o.id == 3 && o.parent_id == Some(1)));
    }

    #[test]
    fn skips_garbage_and_unknown_events() {
        assert_eq!(StreamEvent::classify(&sse("json_message", "{broken")), None);
        assert_eq!(StreamEvent::classify(&sse("hud", "{}")), None);
        assert_eq!(StreamEvent::classify(&sse("message", "[1]")), None);
    }

    #[test]
    fn legacy_message_becomes_agent_message() {
        let event = StreamEvent::classify(&sse("message", r#"{"type":"message","content":"hello"}"#));
        assert!(matches!(event, Some(StreamEvent::Message(m)) if m.content == "hello" && m.sender == Sender::Agent));
    }

    #[test]
    fn buffers_append_per_kind_and_clear() {
        let mut buffers = EventBuffers::default();
        buffers.push(StreamEvent::Status("a".into()));
        buffers.push(StreamEvent::Status("b".into()));
        buffers.push(StreamEvent::Error("e".into()));
        assert_eq!(buffers.statuses, ["a", "b"]);
        assert_eq!(buffers.errors.len(), 1);
        buffers.clear();
        assert!(buffers.statuses.is_empty() && buffers.errors.is_empty());
    }
}
