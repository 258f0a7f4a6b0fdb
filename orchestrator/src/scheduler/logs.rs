//! Splits a byte stream of log output into lines

use std::collections::VecDeque;

use futures::stream::{self, Stream, StreamExt};

use crate::errors::OrchestratorError;

struct LineSplitter<S> {
    inner: S,
    buffer: Vec<u8>,
    lines: VecDeque<String>,
    done: bool,
}

impl<S> LineSplitter<S> {
    fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.lines.push_back(decode(&line[..line.len() - 1]));
        }
    }

    fn flush(&mut self) {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            self.lines.push_back(decode(&rest));
        }
    }
}

fn decode(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Turn chunks into lines. The stream ends after the first upstream error;
/// dropping it drops `inner`.
pub fn split_lines<S, B, E>(inner: S) -> impl Stream<Item = Result<String, OrchestratorError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]>,
    E: Into<OrchestratorError>,
{
    let splitter = LineSplitter {
        inner,
        buffer: Vec::new(),
        lines: VecDeque::new(),
        done: false,
    };

    stream::unfold(splitter, |mut state| async move {
        loop {
            if let Some(line) = state.lines.pop_front() {
                return Some((Ok(line), state));
            }
            if state.done {
                return None;
            }
            match state.inner.next().await {
                Some(Ok(chunk)) => state.push(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.done = true;
                    state.flush();
                }
            }
        }
    })
}
