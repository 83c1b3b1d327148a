// src/feedback/mod.rs — Comparison feedback between the two answers

pub mod recorder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::infra::errors::QaError;
use crate::session::Session;
use crate::transport::FeedbackPayload;
pub use recorder::FeedbackRecorder;

/// Which answer the user preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Fast,
    Streamed,
    Both,
    Neither,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::Fast,
        Verdict::Streamed,
        Verdict::Both,
        Verdict::Neither,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Fast => "fast",
            Verdict::Streamed => "streamed",
            Verdict::Both => "both",
            Verdict::Neither => "neither",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = QaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Verdict::ALL
            .into_iter()
            .find(|v| v.as_str() == normalized)
            .ok_or_else(|| {
                QaError::Validation(format!(
                    "unknown verdict '{s}' (expected fast, streamed, both or neither)"
                ))
            })
    }
}

/// What the user wants to submit, before it is stamped and sent.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackSubmission {
    pub session_id: String,
    pub fast_answer_id: Option<String>,
    pub question: String,
    pub verdict: Verdict,
    pub comment: String,
}

impl FeedbackSubmission {
    /// Build a submission from a session snapshot.
    pub fn for_session(
        session: &Session,
        verdict: Verdict,
        comment: impl Into<String>,
    ) -> Result<Self, QaError> {
        let session_id = session.id.clone().ok_or(QaError::InvalidState {
            operation: "submit feedback",
            status: session.status,
        })?;
        Ok(Self {
            session_id,
            fast_answer_id: session.fast_answer_id().map(str::to_string),
            question: session.question.clone(),
            verdict,
            comment: comment.into(),
        })
    }
}

/// A submitted, immutable feedback record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub session_id: String,
    pub fast_answer_id: Option<String>,
    pub question: String,
    pub verdict: Verdict,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub(crate) fn stamp(submission: FeedbackSubmission, submitted_at: DateTime<Utc>) -> Self {
        Self {
            session_id: submission.session_id,
            fast_answer_id: submission.fast_answer_id,
            question: submission.question,
            verdict: submission.verdict,
            comment: submission.comment,
            submitted_at,
        }
    }

    /// Whether `submission` carries the same content as this record.
    pub fn matches(&self, submission: &FeedbackSubmission) -> bool {
        self.session_id == submission.session_id
            && self.fast_answer_id == submission.fast_answer_id
            && self.question == submission.question
            && self.verdict == submission.verdict
            && self.comment == submission.comment
    }

    pub fn payload(&self) -> FeedbackPayload {
        FeedbackPayload {
            session_id: self.session_id.clone(),
            fast_answer_id: self.fast_answer_id.clone(),
            question: self.question.clone(),
            verdict: self.verdict,
            comment: self.comment.clone(),
            timestamp: self.submitted_at,
        }
    }
}
