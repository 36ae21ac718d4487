//! Configuration types for smb-spk.
//!
//! Every section has sensible defaults so an empty TOML document is a
//! valid configuration. Durations are whole seconds in TOML and in the
//! environment.

mod env;

pub use env::{DEFAULT_PREFIX, EnvConfig};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default Horizons host.
pub const DEFAULT_HOST: &str = "ssd.jpl.nasa.gov";

/// Default Horizons telnet port.
pub const DEFAULT_HORIZONS_PORT: u16 = 6775;

/// Default FTP control port.
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Publication directory holding generated SPK files.
pub const DEFAULT_FTP_DIRECTORY: &str = "pub/ssd";

/// Default per-stage deadline.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ephemeris dialogue settings.
    pub horizons: HorizonsConfig,
    /// File retrieval settings.
    pub retrieval: RetrievalConfig,
    /// Connection settings shared by both dialogues.
    pub session: SessionConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply environment overrides on top of this configuration.
    pub fn apply_env(mut self, env: &EnvConfig) -> Result<Self, ConfigError> {
        if let Some(host) = env.get("HORIZONS_HOST") {
            self.horizons.host = host;
        }
        if let Some(port) = env.parsed("HORIZONS_PORT")? {
            self.horizons.port = port;
        }
        if let Some(timeout) = env.duration_secs("HORIZONS_STAGE_TIMEOUT")? {
            self.horizons.stage_timeout = timeout;
        }
        if let Some(timeout) = env.duration_secs("HORIZONS_COMPUTATION_TIMEOUT")? {
            self.horizons.computation_timeout = Some(timeout);
        }
        if let Some(host) = env.get("RETRIEVAL_HOST") {
            self.retrieval.host = host;
        }
        if let Some(port) = env.parsed("RETRIEVAL_PORT")? {
            self.retrieval.port = port;
        }
        if let Some(passive) = env.bool("RETRIEVAL_PASSIVE")? {
            self.retrieval.passive = passive;
        }
        if let Some(dir) = env.get("RETRIEVAL_DIRECTORY") {
            self.retrieval.directory = dir;
        }
        if let Some(filter) = env.get("LOG") {
            self.logging.filter = filter;
        }
        if let Some(dir) = env.get("TRANSCRIPT_DIR") {
            self.logging.transcript_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }
}

/// Settings for the Horizons ephemeris dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HorizonsConfig {
    /// Host name of the Horizons service.
    pub host: String,
    /// Telnet port of the Horizons service.
    pub port: u16,
    /// Deadline applied to every stage except span validation.
    #[serde(with = "secs")]
    pub stage_timeout: Duration,
    /// Deadline for the span-validation stage, where the server computes
    /// the SPK. Absent means no deadline.
    #[serde(with = "opt_secs")]
    pub computation_timeout: Option<Duration>,
    /// Token sent to leave Horizons when the session closes.
    pub quit_token: String,
}

impl Default for HorizonsConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_HORIZONS_PORT,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            computation_timeout: None,
            quit_token: "exit".to_string(),
        }
    }
}

impl HorizonsConfig {
    /// `host:port` of the service.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings for the FTP retrieval dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Host name of the file server.
    pub host: String,
    /// FTP control port.
    pub port: u16,
    /// Remote publication directory.
    pub directory: String,
    /// Login name for the anonymous session.
    pub user: String,
    /// Start in passive mode instead of active mode.
    pub passive: bool,
    /// Deadline applied to every control-channel stage.
    #[serde(with = "secs")]
    pub stage_timeout: Duration,
    /// Deadline for the data transfer itself.
    #[serde(with = "secs")]
    pub transfer_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_FTP_PORT,
            directory: DEFAULT_FTP_DIRECTORY.to_string(),
            user: "anonymous".to_string(),
            passive: false,
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            transfer_timeout: Duration::from_secs(600),
        }
    }
}

impl RetrievalConfig {
    /// `host:port` of the file server.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Terminator appended by `send_line`.
    pub line_ending: LineEnding,
    /// Deadline for establishing the connection.
    #[serde(with = "secs")]
    pub connect_timeout: Duration,
    /// Deadline for flushing an outgoing line.
    #[serde(with = "secs")]
    pub flush_timeout: Duration,
    /// Maximum unconsumed text kept in memory, in bytes.
    pub max_buffer: usize,
    /// Strip telnet option negotiation from the inbound stream.
    pub telnet: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line_ending: LineEnding::CrLf,
            connect_timeout: Duration::from_secs(30),
            flush_timeout: Duration::from_secs(5),
            max_buffer: crate::expect::DEFAULT_CAPACITY,
            telnet: false,
        }
    }
}

impl SessionConfig {
    /// Set the line ending style.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Enable or disable telnet negotiation filtering.
    #[must_use]
    pub const fn telnet(mut self, enabled: bool) -> Self {
        self.telnet = enabled;
        self
    }

    /// Set the maximum buffer size.
    #[must_use]
    pub const fn max_buffer(mut self, bytes: usize) -> Self {
        self.max_buffer = bytes;
        self
    }
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    Lf,

    /// Network line ending (CRLF), required by FTP.
    #[default]
    CrLf,

    /// Carriage return only, as a terminal sends.
    Cr,
}

impl LineEnding {
    /// Get the line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }
}

/// Configuration for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    /// Log format.
    pub format: LogFormat,
    /// Directory receiving one NDJSON transcript per dialogue run.
    #[serde(alias = "transcript")]
    pub transcript_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            transcript_dir: None,
        }
    }
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,

    /// Newline-delimited JSON.
    Json,
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|v| v.map(Duration::from_secs))
    }
}
