//! Per-agent event streams and the view state folded from them.
//!
//! Bytes from `GET /sse/{agent}` go through [`SseDecoder`], are classified
//! into [`StreamEvent`]s, and are folded into [`ChatState`] or [`StatusView`].

pub mod chat;
pub mod connection;
pub mod events;
pub mod observables;
pub mod sse;
pub mod status;

pub use chat::{ChatSession, ChatState, DEFAULT_SENDING_FAILSAFE};
pub use connection::{ConnectionState, EventStream, ReconnectPolicy, StreamError};
pub use events::{ChatMessage, EventBuffers, Sender, StreamEvent};
pub use observables::{Observable, ObservableNode, ObservableStore};
pub use sse::{SseDecoder, SseEvent};
pub use status::{StatusView, StatusWatcher};
