use super::connection::{ConnectionState, EventStream, ReconnectPolicy};
use super::events::{ChatMessage, EventBuffers, Sender, StreamEvent};
use crate::api::{ApiClient, ApiError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_SENDING_FAILSAFE: Duration = Duration::from_millis(5000);

// ============================================================================
// Chat state
// ============================================================================

/// Conversation view state folded from local sends and stream events.
#[derive(Debug, Default, Clone)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    seen_ids: HashSet<String>,
    recently_sent: HashSet<String>,
    sending: bool,
    generation: u64,
    error: Option<String>,
    status: Option<String>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Append the optimistic user message and raise the sending flag.
    /// Returns the send generation for the failsafe.
    pub fn begin_send(&mut self, content: &str) -> u64 {
        let message = ChatMessage::user(content);
        self.seen_ids.insert(message.id.clone());
        self.recently_sent.insert(message.content.clone());
        self.messages.push(message);
        self.sending = true;
        self.error = None;
        self.generation += 1;
        self.generation
    }

    /// The POST itself failed.
    pub fn send_failed(&mut self, generation: u64, error: impl Into<String>) {
        self.error = Some(error.into());
        if generation == self.generation {
            self.sending = false;
        }
    }

    /// Failsafe timer fired. A timer from an older send is ignored.
    pub fn failsafe_elapsed(&mut self, generation: u64) -> bool {
        if generation == self.generation && self.sending {
            debug!("Sending failsafe elapsed (generation {})", generation);
            self.sending = false;
            return true;
        }
        false
    }

    /// Fold one stream event in. Returns whether visible state changed.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Message(message) => {
                if self.seen_ids.contains(&message.id) {
                    return false;
                }
                self.seen_ids.insert(message.id.clone());
                if message.sender == Sender::User && self.recently_sent.remove(&message.content) {
                    return false;
                }
                self.messages.push(message.clone());
                true
            }
            StreamEvent::Status(status) => {
                if status == "completed" {
                    self.sending = false;
                }
                self.status = Some(status.clone());
                true
            }
            StreamEvent::Error(error) => {
                self.error = Some(error.clone());
                true
            }
            StreamEvent::Observable(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen_ids.clear();
        self.recently_sent.clear();
        self.error = None;
    }
}

// ============================================================================
// Chat session
// ============================================================================

/// Live chat with one agent: posts messages and folds its event stream.
pub struct ChatSession {
    agent: String,
    client: ApiClient,
    state: Arc<Mutex<ChatState>>,
    buffers: Arc<Mutex<EventBuffers>>,
    version: watch::Sender<u64>,
    connection: watch::Receiver<ConnectionState>,
    failsafe: Duration,
    fold: JoinHandle<()>,
}

impl ChatSession {
    pub fn open(client: &ApiClient, agent: &str, policy: ReconnectPolicy, failsafe: Duration) -> Self {
        let mut stream = EventStream::open(client, agent, policy);
        let connection = stream.watch_state();
        let state = Arc::new(Mutex::new(ChatState::new()));
        let buffers = Arc::new(Mutex::new(EventBuffers::default()));
        let (version, _) = watch::channel(0u64);

        let fold = {
            let state = state.clone();
            let buffers = buffers.clone();
            let version = version.clone();
            tokio::spawn(async move {
                while let Some(event) = stream.next().await {
                    let changed = state.lock().apply(&event);
                    buffers.lock().push(event);
                    if changed {
                        version.send_modify(|v| *v += 1);
                    }
                }
            })
        };

        Self {
            agent: agent.to_string(),
            client: client.clone(),
            state,
            buffers,
            version,
            connection,
            failsafe,
            fold,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn snapshot(&self) -> ChatState {
        self.state.lock().clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages().to_vec()
    }

    pub fn is_sending(&self) -> bool {
        self.state.lock().is_sending()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error().map(String::from)
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Raw decoded events received so far, by kind.
    pub fn buffers(&self) -> EventBuffers {
        self.buffers.lock().clone()
    }

    /// Bumps on every visible change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Wait until `predicate` holds for the chat state.
    pub async fn wait_until(&self, predicate: impl Fn(&ChatState) -> bool) {
        let mut updates = self.subscribe();
        loop {
            if predicate(&*self.state.lock()) {
                return;
            }
            if updates.changed().await.is_err() {
                return;
            }
        }
    }

    /// Send a user message. Blank input is ignored.
    pub async fn send(&self, content: &str) -> Result<(), ApiError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }

        let generation = self.state.lock().begin_send(content);
        self.bump();
        self.schedule_failsafe(generation);

        match self.client.send_message(&self.agent, content).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Sending to '{}' failed: {}", self.agent, e);
                self.state.lock().send_failed(generation, e.to_string());
                self.bump();
                Err(e)
            }
        }
    }

    /// Clear local messages only.
    pub fn clear(&self) {
        self.state.lock().clear();
        self.buffers.lock().clear();
        self.bump();
    }

    /// Clear local messages and the backend's history.
    pub async fn clear_history(&self) -> Result<(), ApiError> {
        self.client.clear_chat(&self.agent).await?;
        self.clear();
        Ok(())
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    fn schedule_failsafe(&self, generation: u64) {
        let state: Weak<Mutex<ChatState>> = Arc::downgrade(&self.state);
        let version = self.version.clone();
        let delay = self.failsafe;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let fired = state.lock().failsafe_elapsed(generation);
            if fired {
                version.send_modify(|v| *v += 1);
            }
        });
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.fold.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn agent_message(id: &str, content: &str) -> StreamEvent {
        StreamEvent::Message(ChatMessage {
            id: id.to_string(),
            sender: Sender::Agent,
            content: content.to_string(),
            timestamp: Utc::now(),
        })
    }

    fn user_echo(id: &str, content: &str) -> StreamEvent {
        StreamEvent::Message(ChatMessage {
            id: id.to_string(),
            sender: Sender::User,
            content: content.to_string(),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn duplicate_ids_are_dropped() {
        let mut chat = ChatState::new();
        assert!(chat.apply(&agent_message("m1", "hi")));
        assert!(!chat.apply(&agent_message("m1", "hi")));
        assert_eq!(chat.messages().len(), 1);
    }

    #[test]
    fn echo_of_own_message_is_dropped_once() {
        let mut chat = ChatState::new();
        chat.begin_send("hello");
        assert!(!chat.apply(&user_echo("srv-1", "hello")));
        let hellos = chat.messages().iter().filter(|m| m.content == "hello").count();
        assert_eq!(hellos, 1);

        assert!(chat.apply(&user_echo("srv-2", "hello")));
    }

    #[test]
    fn completed_status_clears_sending() {
        let mut chat = ChatState::new();
        chat.begin_send("do it");
        assert!(chat.is_sending());
        chat.apply(&StreamEvent::Status("thinking".into()));
        assert!(chat.is_sending());
        chat.apply(&StreamEvent::Status("completed".into()));
        assert!(!chat.is_sending());
        assert_eq!(chat.status(), Some("completed"));
    }

    #[test]
    fn stale_failsafe_does_not_clear_newer_send() {
        let mut chat = ChatState::new();
        let first = chat.begin_send("one");
        chat.apply(&StreamEvent::Status("completed".into()));
        let _second = chat.begin_send("two");
        assert!(!chat.failsafe_elapsed(first));
        assert!(chat.is_sending());
    }

    #[test]
    fn error_event_sets_banner_and_send_clears_it() {
        let mut chat = ChatState::new();
        chat.apply(&StreamEvent::Error("model offline".into()));
        assert_eq!(chat.error(), Some("model offline"));
        chat.begin_send("retry");
        assert_eq!(chat.error(), None);
    }

    #[test]
    fn clear_empties_messages() {
        let mut chat = ChatState::new();
        chat.begin_send("a");
        chat.apply(&agent_message("m1", "b"));
        chat.clear();
        assert!(chat.messages().is_empty());
        assert!(chat.apply(&agent_message("m1", "b")));
    }
}
