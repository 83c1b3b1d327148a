// tests/common/mod.rs — Scripted transport shared by integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Map;
use tokio::sync::Notify;

use dualqa::infra::errors::QaError;
use dualqa::session::Session;
use dualqa::transport::{
    ChannelEvent, ChannelHandle, EventSink, FastAnswer, FeedbackPayload, InitiateResponse,
    RemoteStatus, Transport,
};

/// A transport that answers initiate requests from a script and hands every
/// opened channel's sink back to the test, so events can be injected by hand.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<InitiateResponse, QaError>>>,
    sinks: Mutex<Vec<EventSink>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    feedback: Mutex<Vec<FeedbackPayload>>,
    gated: AtomicBool,
    gate: Notify,
    no_resume: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_response(&self, response: Result<InitiateResponse, QaError>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
    }

    /// Hold every initiate call until `release()`.
    pub fn hold_initiate(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.gated.store(false, Ordering::SeqCst);
        self.gate.notify_one();
    }

    pub fn disable_resume(&self) {
        self.no_resume.store(true, Ordering::SeqCst);
    }

    /// Sink of the `n`th opened channel (0-based).
    pub fn sink(&self, n: usize) -> EventSink {
        self.sinks.lock().unwrap()[n].clone()
    }

    pub fn emit(&self, n: usize, event: ChannelEvent) {
        assert!(self.sink(n).emit(event), "machine is gone");
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn feedback(&self) -> Vec<FeedbackPayload> {
        self.feedback.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn initiate(&self, question: &str, _caller_id: &str) -> Result<InitiateResponse, QaError> {
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        let scripted = self.responses.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(initiate_response("s1", Some(question))))
    }

    fn open_stream(&self, endpoint: &str, sink: EventSink) -> Result<ChannelHandle, QaError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().push(sink);
        let closed = self.closed.clone();
        Ok(ChannelHandle::new(endpoint, move || {
            closed.fetch_add(1, Ordering::SeqCst);
        }))
    }

    async fn fetch_status(&self, session_id: &str) -> Result<RemoteStatus, QaError> {
        Ok(RemoteStatus {
            status: "streaming".into(),
            session_id: Some(session_id.to_string()),
            extra: Map::new(),
        })
    }

    async fn submit_feedback(&self, payload: &FeedbackPayload) -> Result<(), QaError> {
        self.feedback.lock().unwrap().push(payload.clone());
        Ok(())
    }

    fn supports_resume(&self) -> bool {
        !self.no_resume.load(Ordering::SeqCst)
    }
}

/// An initiate response for `session_id`, with a fast answer when
/// `fast_text` is given.
pub fn initiate_response(session_id: &str, fast_text: Option<&str>) -> InitiateResponse {
    InitiateResponse {
        session_id: session_id.to_string(),
        fast_answer: fast_text.map(|text| FastAnswer {
            id: Some(format!("fa-{session_id}")),
            text: text.to_string(),
            confidence_score: 0.82,
            source_tier: "cache".into(),
            elapsed_ms: 40,
            direct_answer_eligible: false,
        }),
        stream_endpoint: format!("/session/{session_id}/stream"),
    }
}

/// Collects every snapshot an observer receives.
pub fn recording() -> (Arc<Mutex<Vec<Session>>>, impl Fn(&Session) + Send + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |session: &Session| {
        sink.lock().unwrap().push(session.clone())
    })
}
