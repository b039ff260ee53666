pub mod sse;
pub mod types;

use std::collections::VecDeque;

use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::debug;

pub use sse::{SseDecoder, SseFrame};
pub use types::StreamEvent;

use crate::api::ApiError;

/// Decoded run stream. Always ends with `Close` unless the transport fails.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ApiError>>;

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl<S> DecodeState<S> {
    fn queue(&mut self, frame: SseFrame) {
        debug!(event = ?frame.event, data = %frame.data, "sse frame");
        self.pending.push_back(StreamEvent::from_frame(&frame));
    }
}

/// Turn a byte stream (e.g. `reqwest::Response::bytes_stream`) into stream events.
/// End of input yields a final `Close`; a transport error or an over-long line
/// ends the stream after the error.
pub fn decode_event_stream<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let state = DecodeState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((Ok(event), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => match state.decoder.push(chunk.as_ref()) {
                    Ok(frames) => {
                        for frame in frames {
                            state.queue(frame);
                        }
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(ApiError::Transport(e.to_string())), state));
                    }
                },
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    if let Some(frame) = state.decoder.finish() {
                        state.queue(frame);
                    }
                    state.pending.push_back(StreamEvent::Close);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
