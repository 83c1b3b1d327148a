// src/session/types.rs — Session snapshot and lifecycle status

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::accumulator::ChunkAccumulator;
use crate::transport::FastAnswer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Idle,
    AwaitingFastAnswer,
    Streaming,
    Completed,
    Failed,
    Interrupted,
}

impl SessionStatus {
    /// A request or channel is in flight.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionStatus::AwaitingFastAnswer | SessionStatus::Streaming
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Interrupted
        )
    }

    pub fn is_retryable(self) -> bool {
        matches!(self, SessionStatus::Failed | SessionStatus::Interrupted)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::AwaitingFastAnswer => "awaiting fast answer",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
            SessionStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// The single active question and everything known about its answers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Assigned by the upstream on initiation.
    pub id: Option<String>,
    pub question: String,
    pub fast_answer: Option<FastAnswer>,
    #[serde(flatten)]
    pub(crate) streamed: ChunkAccumulator,
    pub status: SessionStatus,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub stream_started_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn idle() -> Self {
        Self {
            id: None,
            question: String::new(),
            fast_answer: None,
            streamed: ChunkAccumulator::new(),
            status: SessionStatus::Idle,
            error: None,
            started_at: None,
            stream_started_at: None,
        }
    }

    pub(crate) fn begin(question: &str) -> Self {
        let mut streamed = ChunkAccumulator::new();
        streamed.reset();
        Self {
            question: question.to_string(),
            streamed,
            status: SessionStatus::AwaitingFastAnswer,
            started_at: Some(Utc::now()),
            ..Self::idle()
        }
    }

    pub fn streamed_answer(&self) -> &str {
        self.streamed.text()
    }

    pub fn fragment_count(&self) -> usize {
        self.streamed.fragment_count()
    }

    pub fn stream_elapsed_ms(&self) -> u64 {
        self.streamed.sampled_ms()
    }

    pub fn fast_answer_id(&self) -> Option<&str> {
        self.fast_answer.as_ref().and_then(|f| f.id.as_deref())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::idle()
    }
}
