// src/transport/http.rs — HTTP transport (reqwest + server-sent events)

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use url::Url;

use super::types::InitiateRequest;
use super::{
    ChannelEvent, ChannelHandle, EventSink, FeedbackPayload, InitiateResponse, RemoteStatus,
    Transport,
};
use crate::infra::config::UpstreamConfig;
use crate::infra::errors::QaError;

pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    request_timeout: Duration,
    resume_supported: bool,
}

impl HttpTransport {
    pub fn new(config: &UpstreamConfig) -> Result<Self, QaError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| QaError::Config(format!("invalid base_url '{}': {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(QaError::Config(format!(
                "base_url '{}' cannot carry paths",
                config.base_url
            )));
        }
        // No client-wide timeout: it would also cut long-lived streams.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base,
            request_timeout: config.request_timeout(),
            resume_supported: config.resume_supported,
        })
    }

    /// Append path segments to the base URL, percent-encoding each one.
    fn api_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Stream endpoints may be absolute or relative to the base URL.
    fn resolve_stream_url(&self, endpoint: &str) -> Result<Url, QaError> {
        match Url::parse(endpoint) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base
                .join(endpoint)
                .map_err(|e| QaError::transport(format!("invalid stream endpoint '{endpoint}': {e}"))),
            Err(e) => Err(QaError::transport(format!(
                "invalid stream endpoint '{endpoint}': {e}"
            ))),
        }
    }

    async fn error_from_response(context: &str, response: reqwest::Response) -> QaError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        QaError::Transport {
            message: format!("{context}: HTTP {status}: {body}"),
            status: Some(status.as_u16()),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn initiate(
        &self,
        question: &str,
        caller_id: &str,
    ) -> Result<InitiateResponse, QaError> {
        let body = InitiateRequest {
            question: question.to_string(),
            caller_id: caller_id.to_string(),
        };
        let response = self
            .client
            .post(self.api_url(&["session", "initiate"]))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| QaError::transport(format!("initiate request failed: {e}")))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Self::error_from_response("initiate", response).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| QaError::transport(format!("failed to read initiate response: {e}")))?;
        InitiateResponse::parse(&text)
    }

    fn open_stream(&self, endpoint: &str, sink: EventSink) -> Result<ChannelHandle, QaError> {
        let url = self.resolve_stream_url(endpoint)?;
        let mut source = self
            .client
            .get(url.clone())
            .eventsource()
            .map_err(|e| QaError::transport(format!("cannot open stream: {e}")))?;
        // Reconnects are an explicit user decision, never automatic.
        source.set_retry_policy(Box::new(Never));

        let label = url.to_string();
        tracing::debug!("Opening stream {} (generation {})", label, sink.generation());
        let task = tokio::spawn(pump_events(source, sink, label.clone()));
        Ok(ChannelHandle::from_task(label, task))
    }

    async fn fetch_status(&self, session_id: &str) -> Result<RemoteStatus, QaError> {
        let response = self
            .client
            .get(self.api_url(&["session", session_id, "status"]))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("status", response).await);
        }

        response
            .json::<RemoteStatus>()
            .await
            .map_err(|e| QaError::transport(format!("malformed status response: {e}")))
    }

    async fn submit_feedback(&self, payload: &FeedbackPayload) -> Result<(), QaError> {
        let response = self
            .client
            .post(self.api_url(&["session", "feedback"]))
            .timeout(self.request_timeout)
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("feedback", response).await);
        }
        Ok(())
    }

    fn supports_resume(&self) -> bool {
        self.resume_supported
    }
}

/// Forward decoded events until a terminal one, then stop.
///
/// A stream that ends or errors before `complete`/`error` is reported as
/// `Dropped`, never as an upstream error.
async fn pump_events(mut source: EventSource, sink: EventSink, label: String) {
    let mut terminated = false;

    while let Some(next) = source.next().await {
        let event = match next {
            Ok(Event::Open) => {
                tracing::debug!("Stream {} open", label);
                continue;
            }
            Ok(Event::Message(msg)) => match ChannelEvent::from_sse(&msg.event, &msg.data) {
                Some(event) => event,
                None => {
                    tracing::trace!("Ignoring '{}' event on {}", msg.event, label);
                    continue;
                }
            },
            Err(reqwest_eventsource::Error::StreamEnded) => {
                ChannelEvent::Dropped("stream ended without a terminal event".into())
            }
            Err(e) => ChannelEvent::Dropped(e.to_string()),
        };

        terminated = event.is_terminal();
        if !sink.emit(event) || terminated {
            break;
        }
    }

    if !terminated {
        sink.emit(ChannelEvent::Dropped("stream closed".into()));
    }
    source.close();
}
