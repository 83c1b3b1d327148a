// src/feedback/recorder.rs — Exactly-once feedback submission
//
// The recorder follows the session through `track()` (wired as a machine
// observer) so it can reject feedback aimed at a superseded session. Only the
// latest submitted record is kept; an identical resubmission returns it
// without another upstream request.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::{FeedbackRecord, FeedbackSubmission};
use crate::infra::errors::QaError;
use crate::session::{Session, SessionStatus};
use crate::transport::Transport;

#[derive(Debug, Clone)]
struct Target {
    session_id: Option<String>,
    status: SessionStatus,
}

pub struct FeedbackRecorder {
    transport: Arc<dyn Transport>,
    target: Mutex<Target>,
    submitted: tokio::sync::Mutex<Option<FeedbackRecord>>,
}

impl FeedbackRecorder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            target: Mutex::new(Target {
                session_id: None,
                status: SessionStatus::Idle,
            }),
            submitted: tokio::sync::Mutex::new(None),
        }
    }

    /// Follow the latest session snapshot.
    pub fn track(&self, session: &Session) {
        if let Ok(mut target) = self.target.lock() {
            target.session_id = session.id.clone();
            target.status = session.status;
        }
    }

    /// Send feedback for the most recently finished session.
    pub async fn submit(&self, submission: FeedbackSubmission) -> Result<FeedbackRecord, QaError> {
        self.check_target(&submission.session_id)?;

        // Held across the request so concurrent duplicates wait and dedupe.
        let mut submitted = self.submitted.lock().await;
        if let Some(existing) = submitted
            .as_ref()
            .filter(|r| r.session_id == submission.session_id)
        {
            if existing.matches(&submission) {
                tracing::debug!(
                    "Duplicate feedback for session {} ignored",
                    submission.session_id
                );
                return Ok(existing.clone());
            }
            return Err(QaError::AlreadySubmitted {
                session_id: submission.session_id,
            });
        }

        // A new question may have started while waiting for the lock.
        self.check_target(&submission.session_id)?;

        let record = FeedbackRecord::stamp(submission, Utc::now());
        self.transport.submit_feedback(&record.payload()).await?;
        tracing::info!(
            "Feedback '{}' recorded for session {}",
            record.verdict,
            record.session_id
        );
        *submitted = Some(record.clone());
        Ok(record)
    }

    /// The record already submitted for `session_id`, if any.
    pub async fn submitted_for(&self, session_id: &str) -> Option<FeedbackRecord> {
        self.submitted
            .lock()
            .await
            .as_ref()
            .filter(|r| r.session_id == session_id)
            .cloned()
    }

    fn check_target(&self, session_id: &str) -> Result<(), QaError> {
        let target = self
            .target
            .lock()
            .map(|t| t.clone())
            .map_err(|_| anyhow::anyhow!("feedback target lock poisoned"))?;

        if target.session_id.as_deref() != Some(session_id) {
            return Err(QaError::StaleSession {
                session_id: session_id.to_string(),
            });
        }
        if !target.status.is_terminal() {
            return Err(QaError::InvalidState {
                operation: "submit feedback",
                status: target.status,
            });
        }
        Ok(())
    }
}
