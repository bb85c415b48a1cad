//! Transient notifications: at most one visible, the rest queued FIFO.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

impl fmt::Display for ToastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToastKind::Success => "success",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
            ToastKind::Warning => "warning",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToastId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub kind: ToastKind,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

// ============================================================================
// Queue
// ============================================================================

/// Synchronous queue state. Timing is the caller's business.
#[derive(Debug)]
pub struct ToastQueue {
    visible: Option<Toast>,
    pending: VecDeque<Toast>,
    next_id: u64,
    default_duration: Duration,
}

impl ToastQueue {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            visible: None,
            pending: VecDeque::new(),
            next_id: 1,
            default_duration,
        }
    }

    /// Enqueue a toast. Returns it when it became visible immediately.
    pub fn show(&mut self, message: impl Into<String>, kind: ToastKind) -> (ToastId, Option<Toast>) {
        let duration = self.default_duration;
        self.show_for(message, kind, duration)
    }

    pub fn show_for(
        &mut self,
        message: impl Into<String>,
        kind: ToastKind,
        duration: Duration,
    ) -> (ToastId, Option<Toast>) {
        let id = ToastId(self.next_id);
        self.next_id += 1;
        let toast = Toast {
            id,
            message: message.into(),
            kind,
            duration,
        };

        if self.visible.is_none() {
            self.visible = Some(toast.clone());
            (id, Some(toast))
        } else {
            self.pending.push_back(toast);
            (id, None)
        }
    }

    /// Dismiss the visible toast and promote the next one.
    ///
    /// Returns the dismissed toast and the newly visible one.
    pub fn hide(&mut self) -> (Option<Toast>, Option<Toast>) {
        let hidden = self.visible.take();
        if hidden.is_some() {
            self.visible = self.pending.pop_front();
        }
        (hidden, self.visible.clone())
    }

    /// Like [`hide`](Self::hide), but only if `id` is still the visible toast.
    pub fn hide_if(&mut self, id: ToastId) -> (Option<Toast>, Option<Toast>) {
        match &self.visible {
            Some(t) if t.id == id => self.hide(),
            _ => (None, None),
        }
    }

    pub fn visible(&self) -> Option<&Toast> {
        self.visible.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ToastEvent {
    Shown(Toast),
    Hidden(Toast),
}

struct Inner {
    queue: Mutex<ToastQueue>,
    events: broadcast::Sender<ToastEvent>,
}

/// Shared toast driver: owns the queue and one timer for the visible toast.
#[derive(Clone)]
pub struct ToastService {
    inner: Arc<Inner>,
}

impl ToastService {
    pub fn new(default_duration: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(ToastQueue::new(default_duration)),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.inner.events.subscribe()
    }

    pub fn show(&self, message: impl Into<String>, kind: ToastKind) -> ToastId {
        let (id, shown) = self.inner.queue.lock().show(message, kind);
        if let Some(toast) = shown {
            self.on_shown(toast);
        }
        id
    }

    pub fn show_for(&self, message: impl Into<String>, kind: ToastKind, duration: Duration) -> ToastId {
        let (id, shown) = self.inner.queue.lock().show_for(message, kind, duration);
        if let Some(toast) = shown {
            self.on_shown(toast);
        }
        id
    }

    /// Dismiss the visible toast before its timer fires.
    pub fn dismiss(&self) {
        let result = self.inner.queue.lock().hide();
        self.on_hidden(result);
    }

    pub fn visible(&self) -> Option<Toast> {
        self.inner.queue.lock().visible().cloned()
    }

    pub fn pending(&self) -> usize {
        self.inner.queue.lock().pending()
    }

    fn on_shown(&self, toast: Toast) {
        debug!("Toast [{}] {}", toast.kind, toast.message);
        let _ = self.inner.events.send(ToastEvent::Shown(toast.clone()));

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No runtime for toast timer, '{}' stays until dismissed", toast.message);
            return;
        };
        let service = self.clone();
        handle.spawn(async move {
            tokio::time::sleep(toast.duration).await;
            let result = service.inner.queue.lock().hide_if(toast.id);
            service.on_hidden(result);
        });
    }

    fn on_hidden(&self, (hidden, next): (Option<Toast>, Option<Toast>)) {
        if let Some(toast) = hidden {
            let _ = self.inner.events.send(ToastEvent::Hidden(toast));
        }
        if let Some(toast) = next {
            self.on_shown(toast);
        }
    }
}

impl Default for ToastService {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
