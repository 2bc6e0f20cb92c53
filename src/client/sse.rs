//! Incremental Server-Sent Events decoder
//!
//! Buffers raw bytes from the HTTP body and yields complete frames:
//!
//! ```text
//! event: assistant_chunk
//! data: {"type":"assistant_chunk","payload":{"content":"Hello"}}
//!
//! ```

use super::error::ApiError;
use super::events::ServerEvent;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

/// One dispatched SSE frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    /// Value of the last `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Line-oriented SSE parser that tolerates arbitrary chunk boundaries
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    /// Last byte seen was `\r`; a following `\n` belongs to the same line break
    after_cr: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every frame completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut frames),
                b'\r' => {
                    self.after_cr = true;
                    self.end_line(&mut frames);
                }
                _ => self.buffer.push(byte),
            }
        }
        frames
    }

    /// Flush a trailing frame when the body ends without a blank line
    pub fn finish(&mut self) -> Option<SseFrame> {
        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            self.end_line(&mut frames);
        }
        self.dispatch(&mut frames);
        frames.pop()
    }

    fn end_line(&mut self, frames: &mut Vec<SseFrame>) {
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw);

        if line.is_empty() {
            self.dispatch(frames);
            return;
        }
        if line.starts_with(':') {
            // comment / keep-alive
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (&*line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry only matter for EventSource reconnects, which we never do
            _ => {}
        }
    }

    fn dispatch(&mut self, frames: &mut Vec<SseFrame>) {
        let event = self.event.take();
        if self.data.is_empty() {
            return;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        frames.push(SseFrame { event, data });
    }
}

struct DecodeState<S> {
    inner: std::pin::Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<ServerEvent, ApiError>>,
    done: bool,
}

/// Turn a raw HTTP body into a stream of typed server events.
///
/// Frames with unknown event names are dropped. Frames that fail to decode
/// surface as non-fatal `ApiErrorKind::Decode` items. The stream ends with an
/// `ApiErrorKind::Closed` item if the body finishes before the terminal event,
/// and ends cleanly right after a terminal event.
pub fn decode_event_stream<S, B, E>(
    body: S,
) -> impl Stream<Item = Result<ServerEvent, ApiError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let state = DecodeState {
        inner: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if matches!(&item, Ok(event) if event.is_terminal()) {
                    state.pending.clear();
                    state.done = true;
                }
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    for frame in state.decoder.push(chunk.as_ref()) {
                        enqueue(&mut state.pending, &frame);
                    }
                }
                Some(Err(e)) => {
                    state.done = true;
                    state
                        .pending
                        .push_back(Err(ApiError::network(format!("Stream read failed: {e}"))));
                }
                None => {
                    if let Some(frame) = state.decoder.finish() {
                        enqueue(&mut state.pending, &frame);
                    }
                    state.done = true;
                    state
                        .pending
                        .push_back(Err(ApiError::closed("Stream closed by server")));
                }
            }
        }
    })
}

fn enqueue(pending: &mut VecDeque<Result<ServerEvent, ApiError>>, frame: &SseFrame) {
    match ServerEvent::from_frame(frame) {
        Ok(Some(event)) => pending.push_back(Ok(event)),
        Ok(None) => {
            tracing::debug!(event = ?frame.event, "Ignoring unknown server event");
        }
        Err(e) => pending.push_back(Err(ApiError::decode(e.to_string()))),
    }
}
