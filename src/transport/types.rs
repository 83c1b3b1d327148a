// src/transport/types.rs — Wire types for the answer service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feedback::Verdict;
use crate::infra::errors::QaError;

/// Body of `POST /session/initiate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub question: String,
    pub caller_id: String,
}

/// Low-latency answer returned inline with the initiate response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastAnswer {
    /// Identifier referenced by feedback, when the upstream provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    pub confidence_score: f64,
    pub source_tier: String,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub direct_answer_eligible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub session_id: String,
    #[serde(default)]
    pub fast_answer: Option<FastAnswer>,
    pub stream_endpoint: String,
}

impl InitiateResponse {
    /// Parse and validate a raw response body.
    pub fn parse(body: &str) -> Result<Self, QaError> {
        let resp: InitiateResponse = serde_json::from_str(body)
            .map_err(|e| QaError::transport(format!("Malformed initiate response: {e}")))?;
        resp.validate()?;
        Ok(resp)
    }

    pub fn validate(&self) -> Result<(), QaError> {
        if self.session_id.trim().is_empty() {
            return Err(QaError::transport(
                "Malformed initiate response: empty sessionId",
            ));
        }
        if self.stream_endpoint.trim().is_empty() {
            return Err(QaError::transport(
                "Malformed initiate response: empty streamEndpoint",
            ));
        }
        if let Some(fast) = &self.fast_answer {
            if !(0.0..=1.0).contains(&fast.confidence_score) {
                return Err(QaError::transport(format!(
                    "Malformed initiate response: confidenceScore {} outside [0, 1]",
                    fast.confidence_score
                )));
            }
        }
        Ok(())
    }
}

/// Result of the `GET /session/{id}/status` polling fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub status: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteStatus {
    /// Whether the upstream reports the answer as fully generated.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status.to_ascii_lowercase().as_str(),
            "complete" | "completed" | "done" | "finished"
        )
    }
}

/// Body of `POST /session/feedback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackPayload {
    pub session_id: String,
    pub fast_answer_id: Option<String>,
    pub question: String,
    pub verdict: Verdict,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}
