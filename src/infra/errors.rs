// src/infra/errors.rs — Error types for dualqa

use thiserror::Error;

use crate::session::SessionStatus;

#[derive(Error, Debug)]
pub enum QaError {
    // Local errors (rejected synchronously, never recorded on the session)
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Session '{session_id}' has been superseded; feedback rejected")]
    StaleSession { session_id: String },

    #[error("Cannot {operation} while session is {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    #[error("Feedback for session '{session_id}' was already submitted with different content")]
    AlreadySubmitted { session_id: String },

    // Remote errors (surfaced through the session's terminal state)
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    #[error("Connection lost: {0}")]
    Connection(String),

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl QaError {
    pub fn transport(message: impl Into<String>) -> Self {
        QaError::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Local errors are rejected before any state change and are never
    /// written into `Session::error`.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            QaError::Validation(_)
                | QaError::Unsupported(_)
                | QaError::StaleSession { .. }
                | QaError::InvalidState { .. }
                | QaError::AlreadySubmitted { .. }
        )
    }
}

impl From<reqwest::Error> for QaError {
    fn from(e: reqwest::Error) -> Self {
        QaError::Transport {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}
