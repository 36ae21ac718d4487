//! smb-spk: scripted Horizons small-body SPK generation and retrieval.
//!
//! The crate drives two prompt-driven remote dialogues with an
//! expect-style automaton: the JPL Horizons telnet interface, which
//! generates an SPK ephemeris file for a small body given osculating
//! elements, and the anonymous FTP server that publishes the file.
//!
//! # Features
//!
//! - **Data-driven dialogues**: each dialogue is a [`StageTable`] of
//!   expect/respond stages run by the [`DialogueEngine`]
//! - **Earliest-match pattern sets** with expected, error-signal and
//!   transient-fault patterns
//! - **Write-once captures** with integer narrowing
//! - **Transcripts** for correlation and deterministic replay
//! - **Mock backend** for testing (feature: `mock`)
//!
//! # Example
//!
//! ```ignore
//! use smb_spk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ConfigError> {
//!     let request = SpkRequest::load("request.toml".as_ref())?;
//!     match run(&request, &Config::default()).await {
//!         Disposition::Success { path } => println!("{}", path.display()),
//!         failure => eprintln!("{}", failure.explain().unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dialog;
pub mod error;
pub mod expect;
pub mod horizons;
pub mod prelude;
pub mod request;
pub mod retrieval;
pub mod run;
pub mod session;
pub mod transcript;
pub mod util;

/// Mock servers for testing.
#[cfg(feature = "mock")]
pub mod mock;

pub use config::{
    Config, EnvConfig, HorizonsConfig, LineEnding, LogFormat, LoggingConfig, RetrievalConfig,
    SessionConfig,
};
pub use dialog::{Abort, DialogueContext, DialogueEngine, Outcome, Stage, StageOutcome, StageTable};
pub use error::{ConfigError, DateField, FailureReason, Result, SessionError};
pub use expect::{Match, Pattern, PatternKind, PatternSet};
pub use horizons::Generated;
#[cfg(feature = "mock")]
pub use mock::{MockConnector, MockDialer, MockTransport, Scenario};
pub use request::{SpkFormat, SpkRequest};
pub use retrieval::{DataConnector, Fetch, TcpConnector};
pub use run::{Dialer, Disposition, TcpDialer, execute, run};
pub use session::SessionClient;
pub use transcript::{Recorder, Transcript, TranscriptEvent};
pub use util::Deadline;
