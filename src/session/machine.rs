// src/session/machine.rs — Session state machine
//
// Owns the single active Session and the single open channel. Everything
// asynchronous (initiate responses, channel events, silence timeouts) comes
// back through inbound queues and is applied in `step()`, one item at a time,
// after checking the generation it was tagged with against the current one.
// Every operation that supersedes a channel bumps the generation, so late
// deliveries from an old channel or an old question are dropped, not applied.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use super::observer::{Observers, SubscriptionId};
use super::types::{Session, SessionStatus};
use crate::infra::config::{RetryMode, SessionConfig};
use crate::infra::errors::QaError;
use crate::transport::{
    ChannelEvent, ChannelHandle, EventSink, InitiateResponse, TaggedEvent, Transport,
};

/// Outcome of an initiate request, tagged like channel events.
#[derive(Debug)]
struct Initiated {
    generation: u64,
    result: Result<InitiateResponse, QaError>,
}

pub struct SessionMachine {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    session: Session,
    generation: u64,
    channel: Option<ChannelHandle>,
    stream_endpoint: Option<String>,
    initiate_task: Option<AbortHandle>,
    last_activity: Option<Instant>,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    initiated_tx: mpsc::UnboundedSender<Initiated>,
    initiated_rx: mpsc::UnboundedReceiver<Initiated>,
    observers: Observers,
}

impl SessionMachine {
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (initiated_tx, initiated_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            config,
            session: Session::idle(),
            generation: 0,
            channel: None,
            stream_endpoint: None,
            initiate_task: None,
            last_activity: None,
            events_tx,
            events_rx,
            initiated_tx,
            initiated_rx,
            observers: Observers::default(),
        }
    }

    // ─── Observation ────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status
    }

    /// Token carried by every queued delivery; bumped on each supersession.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_open_channel(&self) -> bool {
        self.channel.as_ref().is_some_and(|c| c.is_open())
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Register an observer. It is called synchronously after every change,
    /// including once per applied fragment.
    pub fn subscribe(&mut self, observer: impl Fn(&Session) + Send + 'static) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn publish(&self) {
        self.observers.notify(&self.session);
    }

    // ─── User intents ───────────────────────────────────────────

    /// Start a new question, superseding whatever was running.
    ///
    /// Only input validation can fail here; upstream failures surface later
    /// as a `Failed` session.
    pub fn submit(&mut self, question: &str) -> Result<(), QaError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::Validation("question must not be empty".into()));
        }

        self.supersede();
        self.stream_endpoint = None;
        self.session = Session::begin(question);
        tracing::info!("Submitting question (generation {})", self.generation);
        self.publish();

        let transport = self.transport.clone();
        let tx = self.initiated_tx.clone();
        let generation = self.generation;
        let question = question.to_string();
        let caller_id = self.config.caller_id.clone();
        let task = tokio::spawn(async move {
            let result = transport.initiate(&question, &caller_id).await;
            let _ = tx.send(Initiated { generation, result });
        });
        self.initiate_task = Some(task.abort_handle());
        Ok(())
    }

    /// Reopen the channel for the current session id after a failure or
    /// interruption.
    pub fn retry(&mut self) -> Result<(), QaError> {
        let status = self.session.status;
        if !status.is_retryable() {
            return Err(QaError::Unsupported(format!(
                "retry is only possible after a failure or interruption (session is {status})"
            )));
        }
        let Some(session_id) = self.session.id.clone() else {
            return Err(QaError::Unsupported(
                "session was never assigned an upstream id; submit the question again".into(),
            ));
        };
        if !self.transport.supports_resume() {
            return Err(QaError::Unsupported(format!(
                "upstream cannot resume session '{session_id}'"
            )));
        }
        if self.stream_endpoint.is_none() {
            return Err(QaError::Unsupported(format!(
                "no stream endpoint known for session '{session_id}'"
            )));
        }

        self.supersede();
        if self.config.retry_mode == RetryMode::Replay {
            self.session.streamed.reset();
        }
        tracing::info!(
            "Retrying session {} ({:?}, generation {})",
            session_id,
            self.config.retry_mode,
            self.generation
        );
        self.open_channel();
        Ok(())
    }

    /// Stop the in-flight request or channel and mark the session interrupted.
    pub fn cancel(&mut self) -> Result<(), QaError> {
        let status = self.session.status;
        if !status.is_active() {
            return Err(QaError::InvalidState {
                operation: "cancel",
                status,
            });
        }
        self.supersede();
        self.session.streamed.sample();
        self.session.status = SessionStatus::Interrupted;
        self.session.error = None;
        tracing::info!("Session cancelled (was {})", status);
        self.publish();
        Ok(())
    }

    /// Drop the current session entirely and return to `Idle`.
    pub fn clear(&mut self) {
        self.supersede();
        self.stream_endpoint = None;
        self.session = Session::idle();
        self.publish();
    }

    // ─── Driving ────────────────────────────────────────────────

    /// Wait for the next inbound delivery (or the silence deadline) and
    /// apply it. Returns `false` only if every inbound source is closed.
    pub async fn step(&mut self) -> bool {
        let deadline = self.silence_deadline();
        tokio::select! {
            Some(initiated) = self.initiated_rx.recv() => {
                self.apply_initiated(initiated);
                true
            }
            Some(tagged) = self.events_rx.recv() => {
                self.apply_event(tagged);
                true
            }
            _ = sleep_until(deadline) => {
                self.on_silence();
                true
            }
            else => false,
        }
    }

    /// Drive the machine until nothing is in flight.
    pub async fn run_until_settled(&mut self) -> &Session {
        while self.session.status.is_active() {
            if !self.step().await {
                break;
            }
        }
        &self.session
    }

    fn silence_deadline(&self) -> Option<Instant> {
        if self.session.status != SessionStatus::Streaming || self.config.max_silence_seconds == 0 {
            return None;
        }
        // A bound too large for the clock means no deadline at all.
        self.last_activity
            .and_then(|last| last.checked_add(self.config.max_silence()))
    }

    // ─── Transitions ────────────────────────────────────────────

    fn apply_initiated(&mut self, initiated: Initiated) {
        if initiated.generation != self.generation
            || self.session.status != SessionStatus::AwaitingFastAnswer
        {
            tracing::debug!(
                "Discarding initiate response for generation {} (current {})",
                initiated.generation,
                self.generation
            );
            return;
        }
        self.initiate_task = None;

        match initiated.result {
            Ok(response) => {
                tracing::info!(
                    "Session {} initiated (fast answer: {})",
                    response.session_id,
                    response.fast_answer.is_some()
                );
                self.session.id = Some(response.session_id);
                self.session.fast_answer = response.fast_answer;
                self.stream_endpoint = Some(response.stream_endpoint);
                self.open_channel();
            }
            Err(e) => {
                tracing::warn!("Initiate failed: {}", e);
                self.finish(SessionStatus::Failed, Some(e.to_string()));
            }
        }
    }

    /// Open the stream for the current generation. Publishes exactly once:
    /// either `Streaming` with the channel already held, or `Failed`.
    fn open_channel(&mut self) {
        let Some(endpoint) = self.stream_endpoint.clone() else {
            self.finish(
                SessionStatus::Failed,
                Some("no stream endpoint available".into()),
            );
            return;
        };
        let sink = EventSink::new(self.generation, self.events_tx.clone());
        match self.transport.open_stream(&endpoint, sink) {
            Ok(handle) => {
                self.channel = Some(handle);
                self.session.status = SessionStatus::Streaming;
                self.session.error = None;
                self.session.stream_started_at = Some(Utc::now());
                self.last_activity = Some(Instant::now());
                self.publish();
            }
            Err(e) => {
                tracing::warn!("Failed to open stream {}: {}", endpoint, e);
                self.finish(SessionStatus::Failed, Some(e.to_string()));
            }
        }
    }

    fn apply_event(&mut self, tagged: TaggedEvent) {
        if tagged.generation != self.generation {
            tracing::debug!(
                "Discarding event from superseded channel (generation {}, current {})",
                tagged.generation,
                self.generation
            );
            return;
        }
        if self.session.status != SessionStatus::Streaming {
            tracing::debug!("Discarding event while {}", self.session.status);
            return;
        }
        self.last_activity = Some(Instant::now());

        match tagged.event {
            ChannelEvent::Chunk(fragment) => {
                self.session.streamed.append(&fragment);
                self.session.streamed.sample();
                tracing::debug!(
                    "Fragment #{} ({} bytes)",
                    self.session.streamed.fragment_count(),
                    fragment.len()
                );
                self.publish();
            }
            ChannelEvent::Complete => self.finish(SessionStatus::Completed, None),
            ChannelEvent::Error(reason) => {
                tracing::warn!("Upstream reported error: {}", reason);
                self.finish(SessionStatus::Failed, Some(reason));
            }
            ChannelEvent::Dropped(reason) => {
                tracing::warn!("Channel dropped: {}", reason);
                let error = QaError::Connection(reason).to_string();
                self.finish(SessionStatus::Interrupted, Some(error));
            }
        }
    }

    fn on_silence(&mut self) {
        if self.session.status != SessionStatus::Streaming {
            return;
        }
        let secs = self.config.max_silence_seconds;
        tracing::warn!("No channel activity for {}s, treating as interrupted", secs);
        let error = QaError::Connection(format!("no channel activity for {secs}s")).to_string();
        self.finish(SessionStatus::Interrupted, Some(error));
    }

    /// Enter a terminal status: close the channel and publish.
    fn finish(&mut self, status: SessionStatus, error: Option<String>) {
        self.close_channel();
        self.initiate_task = None;
        self.last_activity = None;
        self.session.streamed.sample();
        self.session.status = status;
        self.session.error = error;
        tracing::info!(
            "Session {} {} ({} fragments, {}ms)",
            self.session.id.as_deref().unwrap_or("-"),
            status,
            self.session.streamed.fragment_count(),
            self.session.streamed.sampled_ms()
        );
        self.publish();
    }

    fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    /// Invalidate everything in flight for the current generation.
    fn supersede(&mut self) {
        self.close_channel();
        if let Some(task) = self.initiate_task.take() {
            task.abort();
        }
        self.last_activity = None;
        self.generation += 1;
    }
}

impl Drop for SessionMachine {
    fn drop(&mut self) {
        self.close_channel();
        if let Some(task) = self.initiate_task.take() {
            task.abort();
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
