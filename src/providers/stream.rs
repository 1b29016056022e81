//! Line framing for streamed HTTP bodies (SSE and NDJSON).

use std::collections::VecDeque;
use std::pin::Pin;

use futures_util::stream::{self, BoxStream, StreamExt};

use crate::providers::capability::{ProviderError, ProviderResult};

struct LineState<S> {
    body: Pin<Box<S>>,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    finished: bool,
}

/// Split a byte stream into trimmed, non-empty text lines.
///
/// A trailing line without a newline is still emitted once the body ends.
pub fn lines<S, B, E>(body: S) -> BoxStream<'static, ProviderResult<String>>
where
    S: futures_util::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<ProviderError> + Send,
{
    let state = LineState {
        body: Box::pin(body),
        buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    while let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                        let raw: Vec<u8> = state.buffer.drain(..=pos).collect();
                        push_line(&mut state.ready, &raw);
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    push_line(&mut state.ready, &rest);
                }
            }
        }
    })
    .boxed()
}

fn push_line(ready: &mut VecDeque<String>, raw: &[u8]) {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        ready.push_back(trimmed.to_string());
    }
}
