// src/transport/mod.rs — Transport layer: initiate request + push channel
//
// The transport owns connection mechanics only. It never interprets session
// state; events are forwarded, tagged with the generation of the session that
// opened the channel, into the state machine's inbound queue.

pub mod events;
pub mod http;
pub mod types;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::infra::errors::QaError;
pub use events::ChannelEvent;
pub use types::{FastAnswer, FeedbackPayload, InitiateResponse, RemoteStatus};

/// Connection to the upstream answer service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST /session/initiate`. Network failure, non-success status and
    /// malformed bodies all map to `QaError::Transport`.
    async fn initiate(&self, question: &str, caller_id: &str)
        -> Result<InitiateResponse, QaError>;

    /// Open the push channel for `endpoint`. Events go to `sink` until the
    /// returned handle is closed or a terminal event is delivered.
    fn open_stream(&self, endpoint: &str, sink: EventSink) -> Result<ChannelHandle, QaError>;

    /// `GET /session/{id}/status`, the polling fallback.
    async fn fetch_status(&self, session_id: &str) -> Result<RemoteStatus, QaError>;

    /// `POST /session/feedback`.
    async fn submit_feedback(&self, payload: &FeedbackPayload) -> Result<(), QaError>;

    /// Whether `open_stream` may be called again for a known session id.
    fn supports_resume(&self) -> bool {
        true
    }
}

/// A channel event stamped with the session generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: ChannelEvent,
}

/// Write end of the state machine's inbound event queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue an event. Returns `false` once the machine is gone.
    pub fn emit(&self, event: ChannelEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// The single open push channel of a session.
///
/// `close()` is idempotent and also runs on drop, so replacing a held handle
/// closes the previous channel. The state machine is the only owner.
pub struct ChannelHandle {
    endpoint: String,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl ChannelHandle {
    pub fn new(endpoint: impl Into<String>, on_close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            endpoint: endpoint.into(),
            on_close: Some(Box::new(on_close)),
        }
    }

    /// Wrap a reader task; closing aborts it.
    pub fn from_task(endpoint: impl Into<String>, task: tokio::task::JoinHandle<()>) -> Self {
        let abort = task.abort_handle();
        Self::new(endpoint, move || abort.abort())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        self.on_close.is_some()
    }

    pub fn close(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
            tracing::debug!("Closed channel {}", self.endpoint);
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("endpoint", &self.endpoint)
            .field("open", &self.is_open())
            .finish()
    }
}
