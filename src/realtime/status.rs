use super::connection::{ConnectionState, EventStream, ReconnectPolicy};
use super::events::StreamEvent;
use super::observables::{ObservableNode, ObservableStore};
use crate::api::{ApiClient, ApiError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// What the status page shows for one agent.
#[derive(Debug, Default, Clone)]
pub struct StatusView {
    pub status: Option<String>,
    pub active: bool,
    pub history: Vec<String>,
    pub error: Option<String>,
    pub observables: ObservableStore,
}

impl StatusView {
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Status(status) => {
                self.status = Some(status);
                true
            }
            StreamEvent::Error(error) => {
                self.error = Some(error);
                true
            }
            StreamEvent::Observable(update) => {
                self.observables.apply(update);
                true
            }
            StreamEvent::Message(_) => false,
        }
    }

    pub fn tree(&self) -> Vec<ObservableNode> {
        self.observables.tree()
    }
}

/// Keeps a [`StatusView`] current from the agent's event stream.
pub struct StatusWatcher {
    agent: String,
    client: ApiClient,
    view: Arc<Mutex<StatusView>>,
    version: watch::Sender<u64>,
    connection: watch::Receiver<ConnectionState>,
    fold: JoinHandle<()>,
}

impl StatusWatcher {
    pub fn open(client: &ApiClient, agent: &str, policy: ReconnectPolicy) -> Self {
        let mut stream = EventStream::open(client, agent, policy);
        let connection = stream.watch_state();
        let view = Arc::new(Mutex::new(StatusView::default()));
        let (version, _) = watch::channel(0u64);

        let fold = {
            let view = view.clone();
            let version = version.clone();
            tokio::spawn(async move {
                while let Some(event) = stream.next().await {
                    if view.lock().apply(event) {
                        version.send_modify(|v| *v += 1);
                    }
                }
            })
        };

        Self {
            agent: agent.to_string(),
            client: client.clone(),
            view,
            version,
            connection,
            fold,
        }
    }

    /// Load the status history and active flag over REST.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let history = self.client.status_history(&self.agent).await?;
        debug!("Loaded {} status entries for '{}'", history.history.len(), self.agent);
        {
            let mut view = self.view.lock();
            view.active = history.active;
            view.history = history.history;
        }
        self.version.send_modify(|v| *v += 1);
        Ok(())
    }

    pub fn snapshot(&self) -> StatusView {
        self.view.lock().clone()
    }

    pub fn tree(&self) -> Vec<ObservableNode> {
        self.view.lock().tree()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

impl Drop for StatusWatcher {
    fn drop(&mut self) {
        self.fold.abort();
    }
}
