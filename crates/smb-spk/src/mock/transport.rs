//! Scripted in-memory transport.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use super::scenario::{Scenario, ScenarioStep};
use crate::transcript::Transcript;

/// Telnet IAC; writes starting with it are negotiation, not lines.
const IAC: u8 = 255;

#[derive(Debug, Default)]
struct MockState {
    /// Chunks waiting to be read, one chunk per read.
    output: VecDeque<Vec<u8>>,
    /// Everything written by the client.
    input: Vec<u8>,
    /// Bytes of the line currently being written.
    partial: Vec<u8>,
    /// Complete lines written by the client.
    lines: Vec<String>,
    steps: VecDeque<ScenarioStep>,
    eof: bool,
    error: Option<String>,
    shut_down: bool,
    reader: Option<Waker>,
}

impl MockState {
    fn wake_reader(&mut self) {
        if let Some(waker) = self.reader.take() {
            waker.wake();
        }
    }

    /// Fire every step that needs no trigger.
    fn run_untriggered(&mut self) {
        while matches!(self.steps.front(), Some(ScenarioStep::Eof)) {
            self.steps.pop_front();
            self.eof = true;
        }
    }

    fn on_line(&mut self, line: String) {
        let fires = matches!(
            self.steps.front(),
            Some(ScenarioStep::Respond { line: expected, .. }) if *expected == line
        );
        self.lines.push(line);
        if !fires {
            return;
        }
        if let Some(ScenarioStep::Respond { chunks, .. }) = self.steps.pop_front() {
            self.output
                .extend(chunks.into_iter().filter(|c| !c.is_empty()).map(String::into_bytes));
        }
        self.run_untriggered();
        self.wake_reader();
    }

    fn on_write(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
        if data.first() == Some(&IAC) {
            return;
        }
        for &byte in data {
            if byte == b'\n' || byte == b'\r' {
                if !self.partial.is_empty() {
                    let line = String::from_utf8_lossy(&self.partial).into_owned();
                    self.partial.clear();
                    self.on_line(line);
                }
            } else {
                self.partial.push(byte);
            }
        }
    }
}

/// A mock transport driven by a [`Scenario`].
///
/// Clones share state: keep one clone in the test to inspect what the
/// client wrote after handing the other to a session.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a transport with nothing scripted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport that plays the server side of `scenario`.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut state = MockState {
            output: scenario
                .initial()
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.clone().into_bytes())
                .collect(),
            steps: scenario.steps().iter().cloned().collect(),
            ..MockState::default()
        };
        state.run_untriggered();
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Create a transport that replays the server side of `transcript`.
    #[must_use]
    pub fn from_transcript(transcript: &Transcript) -> Self {
        Self::from_scenario(&Scenario::from_transcript("replay", transcript))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a chunk to be read.
    pub fn queue_output(&self, data: &[u8]) {
        let mut state = self.lock();
        state.output.push_back(data.to_vec());
        state.wake_reader();
    }

    /// Queue a string to be read.
    pub fn queue_output_str(&self, s: &str) {
        self.queue_output(s.as_bytes());
    }

    /// Signal end of stream once queued output is drained.
    pub fn signal_eof(&self) {
        let mut state = self.lock();
        state.eof = true;
        state.wake_reader();
    }

    /// Make the next read fail with `msg`.
    pub fn fail_next_read(&self, msg: impl Into<String>) {
        let mut state = self.lock();
        state.error = Some(msg.into());
        state.wake_reader();
    }

    /// All bytes written by the client.
    #[must_use]
    pub fn input(&self) -> Vec<u8> {
        self.lock().input.clone()
    }

    /// All bytes written by the client, as text.
    #[must_use]
    pub fn input_str(&self) -> String {
        String::from_utf8_lossy(&self.lock().input).into_owned()
    }

    /// Complete lines written by the client, without terminators.
    #[must_use]
    pub fn written_lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// How many times the client wrote exactly `line`.
    #[must_use]
    pub fn count_line(&self, line: &str) -> usize {
        self.lock().lines.iter().filter(|l| *l == line).count()
    }

    /// Whether the scripted steps have all fired.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.lock().steps.is_empty()
    }

    /// Whether the client shut its side down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

impl AsyncRead for MockTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let mut state = self.lock();

        if let Some(error) = state.error.take() {
            return Poll::Ready(Err(io::Error::other(error)));
        }

        if let Some(mut chunk) = state.output.pop_front() {
            let n = buf.remaining().min(chunk.len());
            buf.put_slice(&chunk[..n]);
            if n < chunk.len() {
                state.output.push_front(chunk.split_off(n));
            }
            return Poll::Ready(Ok(()));
        }

        if state.eof {
            return Poll::Ready(Ok(()));
        }

        state.reader = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl AsyncWrite for MockTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.lock();
        if state.shut_down {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        state.on_write(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut state = self.lock();
        state.shut_down = true;
        Poll::Ready(Ok(()))
    }
}
