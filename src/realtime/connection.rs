use super::events::StreamEvent;
use super::sse::SseDecoder;
use crate::api::ApiClient;
use crate::config::RealtimeConfig;
use crate::infra::abort_signal::{until_aborted, AbortHandle, AbortOnDrop};
use futures::StreamExt;
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connect failed: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("stream refused with status {0}")]
    Status(StatusCode),
    #[error("read failed: {0}")]
    Read(#[source] reqwest::Error),
}

// ============================================================================
// Reconnect policy
// ============================================================================

/// Delay before reconnecting after the stream drops.
///
/// The default retries forever every 5 s. A `factor` above 1.0 backs off
/// exponentially up to `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(5000),
            factor: 1.0,
            max_delay: Duration::from_millis(60_000),
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.reconnect_delay_ms),
            factor: config.backoff_factor,
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_attempts: config.max_attempts,
        }
    }

    /// Delay before reconnect attempt `attempt` (1-based), or `None` once
    /// attempts are exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt > max {
                return None;
            }
        }
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let cap = self.max_delay.max(self.delay);
        let scaled = self.delay.as_millis() as f64 * self.factor.max(1.0).powi(exponent);
        if !scaled.is_finite() || scaled >= cap.as_millis() as f64 {
            return Some(cap);
        }
        Some(Duration::from_millis(scaled.round() as u64))
    }
}

// ============================================================================
// Event stream
// ============================================================================

/// One agent's event stream: a background task that keeps an SSE connection
/// open, decodes and classifies events, and reconnects per policy.
///
/// Closing or dropping the stream stops the task.
pub struct EventStream {
    agent: String,
    state: watch::Receiver<ConnectionState>,
    events: mpsc::Receiver<StreamEvent>,
    abort: AbortOnDrop,
    task: JoinHandle<()>,
}

impl EventStream {
    pub fn open(client: &ApiClient, agent: &str, policy: ReconnectPolicy) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, event_rx) = mpsc::channel(256);
        let abort = AbortHandle::new();

        let task = tokio::spawn(run_stream(
            client.clone(),
            agent.to_string(),
            policy,
            state_tx,
            event_tx,
            abort.clone(),
        ));

        Self {
            agent: agent.to_string(),
            state: state_rx,
            events: event_rx,
            abort: abort.drop_guard(),
            task,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Next classified event; `None` once the stream is closed for good.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    pub fn close(&self) {
        let abort = self.abort.handle();
        if !abort.is_aborted() {
            debug!("Closing event stream for '{}'", self.agent);
            abort.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run_stream(
    client: ApiClient,
    agent: String,
    policy: ReconnectPolicy,
    state: watch::Sender<ConnectionState>,
    events: mpsc::Sender<StreamEvent>,
    abort: AbortHandle,
) {
    let mut attempt: u32 = 0;
    loop {
        state.send_replace(ConnectionState::Connecting);
        let mut connected = false;
        let outcome = until_aborted(
            read_stream(&client, &agent, &state, &events, &mut connected),
            &abort,
        )
        .await;

        match outcome {
            Err(_) => break,
            Ok(Ok(())) => info!("Event stream for '{}' ended", agent),
            Ok(Err(e)) => warn!("Event stream for '{}' failed: {}", agent, e),
        }
        state.send_replace(ConnectionState::Disconnected);

        if events.is_closed() {
            break;
        }
        if connected {
            attempt = 0;
        }
        attempt += 1;
        let Some(delay) = policy.delay_for(attempt) else {
            warn!("Giving up on event stream for '{}' after {} attempts", agent, attempt - 1);
            break;
        };
        debug!("Reconnecting '{}' in {:?} (attempt {})", agent, delay, attempt);
        if until_aborted(tokio::time::sleep(delay), &abort)
            .await
            .is_err()
        {
            break;
        }
    }
    state.send_replace(ConnectionState::Disconnected);
}

async fn read_stream(
    client: &ApiClient,
    agent: &str,
    state: &watch::Sender<ConnectionState>,
    events: &mpsc::Sender<StreamEvent>,
    connected: &mut bool,
) -> Result<(), StreamError> {
    let response = client
        .event_stream_request(agent)
        .send()
        .await
        .map_err(StreamError::Connect)?;
    if !response.status().is_success() {
        return Err(StreamError::Status(response.status()));
    }

    state.send_replace(ConnectionState::Connected);
    *connected = true;
    info!("Event stream for '{}' connected", agent);

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(StreamError::Read)?;
        for raw in decoder.feed(&chunk) {
            let Some(event) = StreamEvent::classify(&raw) else {
                continue;
            };
            if events.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
    decoder.finish();
    Ok(())
}
