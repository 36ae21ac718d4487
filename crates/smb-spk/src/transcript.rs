//! Dialogue transcripts.
//!
//! A [`Recorder`] attached to a session client captures every chunk of
//! text received and every line sent. The resulting [`Transcript`] is
//! stored as newline-delimited JSON, one event per line, and can be
//! replayed through a mock transport to re-run a dialogue offline.

use std::io;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Direction of a transcript event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Text received from the remote side.
    Received,
    /// A line sent to the remote side, without its terminator.
    Sent,
    /// The remote side closed the stream.
    Eof,
}

/// A single transcript event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Milliseconds since recording started.
    pub elapsed_ms: u64,
    /// What happened.
    pub kind: EventKind,
    /// The text involved. Bytes that are not valid UTF-8 are stored as
    /// U+FFFD.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,
}

/// An ordered record of one dialogue's traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    /// The recorded events.
    pub events: Vec<TranscriptEvent>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event.
    pub fn push(&mut self, event: TranscriptEvent) {
        self.events.push(event);
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the transcript has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Lines sent, in order.
    pub fn sent(&self) -> impl Iterator<Item = &str> {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Sent)
            .map(|e| e.data.as_str())
    }

    /// All received text concatenated.
    #[must_use]
    pub fn received_text(&self) -> String {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Received)
            .map(|e| e.data.as_str())
            .collect()
    }

    /// Serialize as NDJSON.
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for event in &self.events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Parse NDJSON. Blank lines are ignored.
    pub fn from_ndjson(text: &str) -> serde_json::Result<Self> {
        let events = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(Self { events })
    }

    /// Write the transcript to `path`.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let text = self.to_ndjson().map_err(io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Read a transcript from `path`.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ndjson(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Records session traffic into a [`Transcript`].
#[derive(Debug)]
pub struct Recorder {
    start: Instant,
    transcript: Transcript,
}

impl Recorder {
    /// Start recording now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            transcript: Transcript::new(),
        }
    }

    fn push(&mut self, kind: EventKind, data: String) {
        let elapsed_ms = u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.transcript.push(TranscriptEvent {
            elapsed_ms,
            kind,
            data,
        });
    }

    /// Record received bytes.
    pub fn record_received(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.push(EventKind::Received, String::from_utf8_lossy(data).into_owned());
    }

    /// Record a sent line.
    pub fn record_sent(&mut self, line: &str) {
        self.push(EventKind::Sent, line.to_string());
    }

    /// Record end of stream.
    pub fn record_eof(&mut self) {
        self.push(EventKind::Eof, String::new());
    }

    /// The transcript so far.
    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Stop recording and return the transcript.
    #[must_use]
    pub fn finish(self) -> Transcript {
        self.transcript
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_has_one_event_per_line() {
        let mut recorder = Recorder::new();
        recorder.record_received(b"Horizons> ");
        recorder.record_sent("PAGE");
        recorder.record_eof();
        let transcript = recorder.finish();

        let text = transcript.to_ndjson().unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().contains(r#""kind":"sent""#));
        assert!(!text.lines().nth(2).unwrap().contains("data"));

        let parsed = Transcript::from_ndjson(&text).unwrap();
        assert_eq!(parsed, transcript);
    }

    #[test]
    fn empty_chunks_are_not_recorded() {
        let mut recorder = Recorder::new();
        recorder.record_received(b"");
        assert!(recorder.transcript().is_empty());
    }

    #[test]
    fn accessors() {
        let mut recorder = Recorder::new();
        recorder.record_received(b"220 ready\r\n");
        recorder.record_sent("USER anonymous");
        recorder.record_received(b"331 send password\r\n");
        let transcript = recorder.finish();

        assert_eq!(transcript.sent().collect::<Vec<_>>(), ["USER anonymous"]);
        assert_eq!(
            transcript.received_text(),
            "220 ready\r\n331 send password\r\n"
        );
    }

    #[test]
    fn malformed_line_is_rejected() {
        assert!(Transcript::from_ndjson("{\"kind\":\"sideways\"}\n").is_err());
    }
}
