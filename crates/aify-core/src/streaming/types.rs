use serde::Deserialize;

use super::sse::SseFrame;
use crate::constants::sse_events;

/// Event on a run stream, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental reply token
    Message(String),
    /// Server-side failure; the reason is shown verbatim
    Error(String),
    /// End of stream
    Close,
    /// Anything else. Logged and ignored.
    Unknown { event: Option<String>, data: String },
}

#[derive(Deserialize)]
struct TokenPayload {
    #[serde(default)]
    c: Option<String>,
}

/// The server emits `{"e": ...}`; older clients read `{"error": ...}`
#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

impl StreamEvent {
    pub fn from_frame(frame: &SseFrame) -> Self {
        match frame.event.as_deref() {
            Some(sse_events::MESSAGE) => match serde_json::from_str::<TokenPayload>(&frame.data) {
                Ok(payload) => StreamEvent::Message(payload.c.unwrap_or_default()),
                Err(_) => Self::unknown(frame),
            },
            Some(sse_events::ERROR) => match serde_json::from_str::<ErrorPayload>(&frame.data) {
                Ok(payload) => StreamEvent::Error(
                    payload
                        .error
                        .or(payload.e)
                        .unwrap_or_else(|| frame.data.clone()),
                ),
                Err(_) => Self::unknown(frame),
            },
            Some(sse_events::CLOSE) => StreamEvent::Close,
            _ => Self::unknown(frame),
        }
    }

    fn unknown(frame: &SseFrame) -> Self {
        StreamEvent::Unknown {
            event: frame.event.clone(),
            data: frame.data.clone(),
        }
    }
}
