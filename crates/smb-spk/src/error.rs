//! Error types for smb-spk.
//!
//! Two layers live here. [`SessionError`] describes what went wrong on a
//! single connection (I/O, timeouts, end of stream); it carries the
//! buffered remote text so a human can see what the server said.
//! [`FailureReason`] is the classified, user-facing reason a dialogue run
//! was abandoned, and is what the orchestrating caller reports.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of buffer content to display in error messages.
const MAX_BUFFER_DISPLAY: usize = 500;

/// Lines kept from the tail of a large buffer.
const TAIL_LINES: usize = 6;

/// Format buffer content for display, truncating if necessary.
fn format_buffer_snippet(buffer: &str) -> String {
    if buffer.is_empty() {
        return "(empty buffer)".to_string();
    }

    let lines: Vec<&str> = buffer.lines().collect();
    if buffer.len() <= MAX_BUFFER_DISPLAY || lines.len() <= TAIL_LINES {
        return format!(
            "┌─ buffer ({} bytes) ──────────────────────\n│ {}\n└────────────────────────────────────────",
            buffer.len(),
            lines.join("\n│ ")
        );
    }

    let tail = &lines[lines.len() - TAIL_LINES..];
    format!(
        "┌─ buffer ({} bytes, {} lines) ─────────────\n│ ... ({} lines hidden)\n│ {}\n└────────────────────────────────────────",
        buffer.len(),
        lines.len(),
        lines.len() - TAIL_LINES,
        tail.join("\n│ ")
    )
}

fn format_timeout_error(duration: Duration, pattern: &str, buffer: &str) -> String {
    format!(
        "timeout after {duration:?} waiting for pattern\n\
         \n\
         Pattern: '{pattern}'\n\
         \n\
         {}",
        format_buffer_snippet(buffer)
    )
}

fn format_eof_error(buffer: &str) -> String {
    format!(
        "remote side closed the connection\n\
         \n\
         {}",
        format_buffer_snippet(buffer)
    )
}

/// Errors raised by a [`SessionClient`](crate::session::SessionClient).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The endpoint could not be resolved or reached.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// The `host:port` that was dialled.
        endpoint: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No pattern matched before the deadline.
    #[error("{}", format_timeout_error(*duration, pattern, buffer))]
    Timeout {
        /// The deadline that elapsed.
        duration: Duration,
        /// Display form of the first awaited pattern.
        pattern: String,
        /// Unconsumed buffer contents at the time of the timeout.
        buffer: String,
    },

    /// The remote side closed the stream before a pattern matched.
    #[error("{}", format_eof_error(buffer))]
    Eof {
        /// Unconsumed buffer contents when the stream ended.
        buffer: String,
    },

    /// The session was already closed.
    #[error("session is closed")]
    SessionClosed,
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create a timeout error with the given details.
    pub fn timeout(
        duration: Duration,
        pattern: impl Into<String>,
        buffer: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            duration,
            pattern: pattern.into(),
            buffer: buffer.into(),
        }
    }

    /// Create an end-of-stream error.
    pub fn eof(buffer: impl Into<String>) -> Self {
        Self::Eof {
            buffer: buffer.into(),
        }
    }

    /// Create a connection error.
    pub fn connect(endpoint: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if this is an end-of-stream error.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Eof { .. })
    }

    /// Get the buffer contents if this error contains them.
    #[must_use]
    pub fn buffer(&self) -> Option<&str> {
        match self {
            Self::Timeout { buffer, .. } | Self::Eof { buffer } => Some(buffer),
            _ => None,
        }
    }
}

/// Which of the two caller-supplied dates the server rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    /// The span start date.
    Start,
    /// The span stop date.
    Stop,
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Stop => f.write_str("stop"),
        }
    }
}

/// Why a dialogue run ended without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The contact address failed the local shape check.
    InvalidContactAddress,
    /// The endpoint could not be resolved or reached.
    ConnectionError,
    /// No pattern matched within the stage deadline.
    StageTimeout {
        /// Index of the stage in its table.
        stage: usize,
    },
    /// The server rejected submitted content.
    ServerReportedInputError,
    /// The server rejected a date.
    InvalidDate(DateField),
    /// The requested span exceeds what the server accepts.
    SpanTooLarge,
    /// The requested span is shorter than the server minimum.
    SpanTooShort,
    /// A captured value did not have the expected shape.
    MalformedCapture,
    /// The file server refused the anonymous login.
    RetrievalAuthFailed,
    /// The artifact is not present on the file server.
    RemoteFileNotFound,
    /// The data connection failed again after the single passive retry.
    TransientFaultExhausted,
    /// The remote side closed the connection mid-dialogue.
    ConnectionClosed,
    /// Reading from or writing to the connection failed.
    Transport,
    /// The local artifact could not be written.
    LocalFile,
}

impl FailureReason {
    /// A single-paragraph explanation suitable for an operator.
    #[must_use]
    pub fn explain(&self) -> String {
        match self {
            Self::InvalidContactAddress => "The contact e-mail address is malformed. It must contain an '@' \
                 that is not the first character. No connection was attempted."
                .to_string(),
            Self::ConnectionError => "Could not connect to the remote host. Check that the host name \
                 resolves and that the network path to the service is open."
                .to_string(),
            Self::StageTimeout { stage } => format!(
                "The remote service did not produce the expected prompt in time \
                 (dialogue stage {stage}). The service may be overloaded or its \
                 prompts may have changed; the session was cancelled."
            ),
            Self::ServerReportedInputError => "The server rejected the submitted input. The server's own \
                 message is included below; correct the orbital elements or \
                 other input and try again."
                .to_string(),
            Self::InvalidDate(which) => format!(
                "The server could not use the {which} date. Dates must be \
                 calendar dates between 1900 and 2100, optionally with a time \
                 of day."
            ),
            Self::SpanTooLarge => "The requested time span is larger than the server allows for \
                 a single SPK file. Shorten the interval between start and stop."
                .to_string(),
            Self::SpanTooShort => "The requested time span is too short. The stop date must be \
                 at least 32 days after the start date."
                .to_string(),
            Self::MalformedCapture => "The server announced a value in an unexpected form (for example \
                 a non-numeric object identifier). The dialogue was abandoned \
                 rather than guessing."
                .to_string(),
            Self::RetrievalAuthFailed => "The file server refused the anonymous login. This usually \
                 means the contact e-mail address was not accepted as a \
                 password; check the address."
                .to_string(),
            Self::RemoteFileNotFound => "The generated file was not found on the file server. It may \
                 have been removed already or not yet published."
                .to_string(),
            Self::TransientFaultExhausted => "The data connection to the file server could not be \
                 established, even after retrying once in passive mode. A \
                 firewall may be blocking FTP data connections."
                .to_string(),
            Self::ConnectionClosed => "The remote service closed the connection before the dialogue \
                 finished."
                .to_string(),
            Self::Transport => "Communication with the remote service failed while the \
                 dialogue was in progress."
                .to_string(),
            Self::LocalFile => "The retrieved file could not be written locally. Check the \
                 output path and available disk space."
                .to_string(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidContactAddress => f.write_str("invalid contact address"),
            Self::ConnectionError => f.write_str("connection error"),
            Self::StageTimeout { stage } => write!(f, "timeout in stage {stage}"),
            Self::ServerReportedInputError => f.write_str("server reported input error"),
            Self::InvalidDate(which) => write!(f, "invalid {which} date"),
            Self::SpanTooLarge => f.write_str("span too large"),
            Self::SpanTooShort => f.write_str("span too short"),
            Self::MalformedCapture => f.write_str("malformed capture"),
            Self::RetrievalAuthFailed => f.write_str("retrieval login failed"),
            Self::RemoteFileNotFound => f.write_str("remote file not found"),
            Self::TransientFaultExhausted => f.write_str("data connection failed after retry"),
            Self::ConnectionClosed => f.write_str("connection closed by remote"),
            Self::Transport => f.write_str("transport error"),
            Self::LocalFile => f.write_str("local file error"),
        }
    }
}

/// Errors raised while loading configuration or requests.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The path that was read.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TOML document is malformed.
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// The environment variable name.
        name: String,
        /// The rejected value.
        value: String,
    },
}
