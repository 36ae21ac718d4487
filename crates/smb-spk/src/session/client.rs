//! The session client.
//!
//! A [`SessionClient`] owns the single live connection of a dialogue. It
//! writes lines, waits for one of a set of patterns with a deadline, and
//! closes the connection exactly once.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::telnet::TelnetFilter;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::expect::{Match, Matcher, PatternSet};
use crate::transcript::{Recorder, Transcript};
use crate::util::Deadline;

/// Size reserved for each read.
const READ_CHUNK: usize = 4096;

/// A client for one prompt-driven remote session.
pub struct SessionClient<T: AsyncRead + AsyncWrite + Unpin + Send> {
    transport: T,
    config: SessionConfig,
    matcher: Matcher,
    telnet: Option<TelnetFilter>,
    recorder: Option<Recorder>,
    quit_token: Option<String>,
    read_buf: BytesMut,
    eof: bool,
    closed: bool,
}

impl SessionClient<TcpStream> {
    /// Connect to `endpoint` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connect`] if the name does not resolve, the
    /// connection is refused, or the connect timeout elapses.
    pub async fn connect(endpoint: &str, config: SessionConfig) -> Result<Self> {
        let stream = connect_tcp(endpoint, &config).await?;
        Ok(Self::new(stream, config))
    }
}

/// Open a TCP connection to `endpoint` within the configured connect timeout.
pub async fn connect_tcp(endpoint: &str, config: &SessionConfig) -> Result<TcpStream> {
    debug!(endpoint, "connecting");
    let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(endpoint)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(SessionError::connect(endpoint, e)),
        Err(_) => {
            return Err(SessionError::connect(
                endpoint,
                io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
            ));
        }
    };
    // Prompts are short; do not let Nagle hold back single lines.
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "TCP_NODELAY not set");
    }
    Ok(stream)
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SessionClient<T> {
    /// Wrap an already-open transport.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        let telnet = config.telnet.then(TelnetFilter::new);
        Self {
            transport,
            matcher: Matcher::new(config.max_buffer),
            config,
            telnet,
            recorder: None,
            quit_token: None,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            eof: false,
            closed: false,
        }
    }

    /// Send `token` as the last line when the session closes.
    #[must_use]
    pub fn with_quit_token(mut self, token: impl Into<String>) -> Self {
        self.quit_token = Some(token.into());
        self
    }

    /// Record all traffic into a transcript.
    #[must_use]
    pub fn with_recorder(mut self, recorder: Recorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// The transcript recorded so far, if recording.
    #[must_use]
    pub fn transcript(&self) -> Option<&Transcript> {
        self.recorder.as_ref().map(Recorder::transcript)
    }

    /// Stop recording and return the transcript.
    pub fn take_transcript(&mut self) -> Option<Transcript> {
        self.recorder.take().map(Recorder::finish)
    }

    /// Get the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Unconsumed text received so far.
    #[must_use]
    pub fn buffer(&self) -> &str {
        self.matcher.buffer_str()
    }

    /// Whether the remote side has closed the stream.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.eof
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    async fn write_bounded(&mut self, data: &[u8]) -> Result<()> {
        let limit = self.config.flush_timeout;
        let transport = &mut self.transport;
        let write = async {
            transport.write_all(data).await?;
            transport.flush().await
        };
        match tokio::time::timeout(limit, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SessionError::io_context("writing to remote", e)),
            Err(_) => Err(SessionError::io_context(
                "flushing to remote",
                io::Error::new(io::ErrorKind::TimedOut, format!("no progress in {limit:?}")),
            )),
        }
    }

    /// Write `line` followed by the configured line ending.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is closed, the write fails, or the
    /// flush timeout elapses.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        if self.closed {
            return Err(SessionError::SessionClosed);
        }
        trace!(line, "send");
        if let Some(recorder) = &mut self.recorder {
            recorder.record_sent(line);
        }
        let data = format!("{line}{}", self.config.line_ending.as_str());
        self.write_bounded(data.as_bytes()).await
    }

    /// Wait until one of `patterns` matches the unconsumed text.
    ///
    /// Text up to and including the match is consumed. The call suspends on
    /// the transport between reads; it never polls.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] when `deadline` passes,
    /// [`SessionError::Eof`] when the stream ends first, or an I/O error.
    pub async fn await_match(&mut self, patterns: &PatternSet, deadline: Deadline) -> Result<Match> {
        loop {
            if let Some(result) = self.matcher.try_match(patterns) {
                return Ok(self.matcher.consume_match(&result));
            }

            if self.eof {
                return Err(SessionError::eof(self.matcher.buffer_str()));
            }

            self.read_buf.reserve(READ_CHUNK);
            let read = deadline.apply(self.transport.read_buf(&mut self.read_buf)).await;
            match read {
                None => {
                    return Err(SessionError::timeout(
                        deadline.limit().unwrap_or_default(),
                        patterns.describe(),
                        self.matcher.buffer_str(),
                    ));
                }
                Some(Ok(0)) => {
                    trace!("end of stream");
                    self.eof = true;
                    if let Some(recorder) = &mut self.recorder {
                        recorder.record_eof();
                    }
                }
                Some(Ok(n)) => {
                    let chunk = self.read_buf.split().freeze();
                    trace!(bytes = n, "received chunk");
                    self.ingest(&chunk).await?;
                }
                Some(Err(e)) => return Err(SessionError::io_context("reading from remote", e)),
            }
        }
    }

    async fn ingest(&mut self, chunk: &[u8]) -> Result<()> {
        let filtered = self.telnet.as_mut().map(|filter| filter.feed(chunk));
        let data = match filtered {
            Some(filtered) => {
                if !filtered.replies.is_empty() {
                    self.write_bounded(&filtered.replies).await?;
                }
                filtered.data
            }
            None => chunk.to_vec(),
        };
        if let Some(recorder) = &mut self.recorder {
            recorder.record_received(&data);
        }
        self.matcher.append(&data);
        Ok(())
    }

    /// Close the session.
    ///
    /// Sends the quit token (if configured), then shuts the transport down.
    /// Failures are ignored. Calling it again does nothing.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(token) = self.quit_token.clone() {
            if let Err(e) = self.send_line(&token).await {
                debug!(error = %e, "quit token not delivered");
            }
        }
        self.closed = true;
        let limit = self.config.flush_timeout;
        let _ = tokio::time::timeout(limit, self.transport.shutdown()).await;
        debug!("session closed");
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> std::fmt::Debug for SessionClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("buffered", &self.matcher.buffer().len())
            .field("telnet", &self.telnet.is_some())
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::LineEnding;
    use crate::expect::{Pattern, PatternKind};
    use crate::mock::{MockTransport, Scenario};

    fn prompt_set(prompt: &str) -> PatternSet {
        let mut set = PatternSet::new();
        set.expected(Pattern::literal(prompt));
        set
    }

    #[tokio::test]
    async fn send_line_appends_line_ending() {
        let transport = MockTransport::new();
        let config = SessionConfig::default().line_ending(LineEnding::Lf);
        let mut client = SessionClient::new(transport.clone(), config);

        client.send_line("PAGE").await.unwrap();
        assert_eq!(transport.input_str(), "PAGE\n");
    }

    #[tokio::test]
    async fn await_match_reads_until_match() {
        let scenario = Scenario::new("greeting").initial_output_chunks(["Hori", "zons> "]);
        let transport = MockTransport::from_scenario(&scenario);
        let mut client = SessionClient::new(transport, SessionConfig::default());

        let m = client
            .await_match(&prompt_set("Horizons> "), Deadline::from_now(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(m.matched, "Horizons> ");
        assert_eq!(m.kind, PatternKind::Expected);
    }

    #[tokio::test(start_paused = true)]
    async fn await_match_times_out() {
        let scenario = Scenario::new("silent").initial_output("Connected\r\n");
        let transport = MockTransport::from_scenario(&scenario);
        let mut client = SessionClient::new(transport, SessionConfig::default());

        let err = client
            .await_match(&prompt_set("Horizons> "), Deadline::from_now(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.buffer(), Some("Connected\r\n"));
    }

    #[tokio::test]
    async fn eof_is_reported_distinctly() {
        let scenario = Scenario::new("hangup").initial_output("bye\r\n").eof();
        let transport = MockTransport::from_scenario(&scenario);
        let mut client = SessionClient::new(transport, SessionConfig::default());

        let err = client
            .await_match(&prompt_set("Horizons> "), Deadline::unbounded())
            .await
            .unwrap_err();
        assert!(err.is_eof());
        assert!(client.is_eof());
    }

    #[tokio::test]
    async fn telnet_negotiation_is_filtered_and_refused() {
        let transport = MockTransport::new();
        transport.queue_output(&[255, 253, 24, b'H', b'>', b' ']);
        let config = SessionConfig::default().telnet(true);
        let mut client = SessionClient::new(transport.clone(), config);

        let m = client
            .await_match(&prompt_set("H> "), Deadline::from_now(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(m.before, "");
        assert_eq!(transport.input(), vec![255, 252, 24]);
    }

    #[tokio::test]
    async fn close_sends_quit_token_once() {
        let transport = MockTransport::new();
        let mut client =
            SessionClient::new(transport.clone(), SessionConfig::default()).with_quit_token("exit");

        client.close().await;
        client.close().await;

        assert_eq!(transport.count_line("exit"), 1);
        assert!(transport.is_shut_down());
        assert!(matches!(
            client.send_line("late").await,
            Err(SessionError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn recorder_captures_traffic() {
        let scenario = Scenario::new("rec")
            .initial_output("220 ready\r\n")
            .expect_respond("USER anonymous", "331 ok\r\n");
        let transport = MockTransport::from_scenario(&scenario);
        let mut client =
            SessionClient::new(transport, SessionConfig::default()).with_recorder(Recorder::new());

        let deadline = Deadline::from_now(Duration::from_secs(5));
        client.await_match(&prompt_set("220"), deadline).await.unwrap();
        client.send_line("USER anonymous").await.unwrap();
        client.await_match(&prompt_set("331"), deadline).await.unwrap();

        let transcript = client.take_transcript().unwrap();
        assert_eq!(transcript.sent().collect::<Vec<_>>(), ["USER anonymous"]);
        assert!(transcript.received_text().contains("331 ok"));
    }

    #[tokio::test]
    async fn connect_tcp_disables_nagle() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();

        let stream = connect_tcp(&endpoint, &SessionConfig::default()).await.unwrap();
        let (_peer, _) = listener.accept().await.unwrap();
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn connect_tcp_refused_is_connect_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect_tcp(&endpoint, &SessionConfig::default()).await.unwrap_err();
        assert!(matches!(err, SessionError::Connect { .. }));
    }
}
