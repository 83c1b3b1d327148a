// src/transport/events.rs — Push channel events

use serde::Serialize;

/// One event delivered by a push channel, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum ChannelEvent {
    /// A partial text fragment of the streamed answer.
    Chunk(String),
    /// The upstream finished generating.
    Complete,
    /// The upstream reported a failure through an explicit `error` event.
    Error(String),
    /// The connection broke before any terminal event arrived.
    Dropped(String),
}

impl ChannelEvent {
    /// Decode a named server-sent event. Unknown names yield `None`.
    ///
    /// `Dropped` never comes off the wire; transports synthesize it.
    pub fn from_sse(name: &str, data: &str) -> Option<Self> {
        match name {
            "chunk" => Some(ChannelEvent::Chunk(data.to_string())),
            "complete" => Some(ChannelEvent::Complete),
            "error" => {
                let reason = if data.trim().is_empty() {
                    "upstream reported an error".to_string()
                } else {
                    data.to_string()
                };
                Some(ChannelEvent::Error(reason))
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChannelEvent::Chunk(_))
    }
}
