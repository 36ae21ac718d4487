//! One complete request: validate, generate, retrieve.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{Instrument, info, info_span, warn};

use crate::config::{Config, LineEnding, SessionConfig};
use crate::dialog::Abort;
use crate::error::{FailureReason, Result};
use crate::horizons::{self, Generated};
use crate::request::SpkRequest;
use crate::retrieval::{self, DataConnector, Fetch, TcpConnector};
use crate::session::{SessionClient, connect_tcp};
use crate::transcript::Recorder;

/// Opens the control connections of a run.
pub trait Dialer: Send {
    /// Control connection type.
    type Control: AsyncRead + AsyncWrite + Unpin + Send;
    /// Data connector used for the retrieval.
    type Data: DataConnector;

    /// Connect to `endpoint`.
    fn dial(
        &mut self,
        endpoint: &str,
        config: &SessionConfig,
    ) -> impl std::future::Future<Output = Result<Self::Control>> + Send;

    /// Data connector for transfers controlled over `control`.
    fn data_connector(&mut self, control: &Self::Control) -> Self::Data;
}

/// Dials real TCP endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

impl Dialer for TcpDialer {
    type Control = TcpStream;
    type Data = TcpConnector;

    async fn dial(&mut self, endpoint: &str, config: &SessionConfig) -> Result<TcpStream> {
        connect_tcp(endpoint, config).await
    }

    fn data_connector(&mut self, control: &TcpStream) -> TcpConnector {
        TcpConnector::for_control(control)
    }
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The artifact was written to `path`.
    Success {
        /// Local artifact path.
        path: PathBuf,
    },
    /// The run failed.
    Failure {
        /// What went wrong.
        reason: FailureReason,
        /// Server text or local error behind the failure.
        diagnostic: Option<String>,
    },
}

impl Disposition {
    /// Whether the artifact was retrieved.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The artifact path on success.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Success { path } => Some(path),
            Self::Failure { .. } => None,
        }
    }

    /// The failure reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, .. } => Some(*reason),
        }
    }

    /// User-facing explanation of a failure, with the diagnostic appended.
    #[must_use]
    pub fn explain(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { reason, diagnostic: None } => Some(reason.explain()),
            Self::Failure {
                reason,
                diagnostic: Some(text),
            } => Some(format!("{}\n\nDetails: {text}", reason.explain())),
        }
    }
}

impl From<Abort> for Disposition {
    fn from(abort: Abort) -> Self {
        Self::Failure {
            reason: abort.reason,
            diagnostic: abort.diagnostic,
        }
    }
}

impl From<FailureReason> for Disposition {
    fn from(reason: FailureReason) -> Self {
        Self::Failure {
            reason,
            diagnostic: None,
        }
    }
}

/// Run `request` against the endpoints in `config` over TCP.
pub async fn run(request: &SpkRequest, config: &Config) -> Disposition {
    execute(&mut TcpDialer, request, config).await
}

/// Run `request`, opening connections through `dialer`.
///
/// The contact address is checked before anything is dialed.
pub async fn execute<D: Dialer>(dialer: &mut D, request: &SpkRequest, config: &Config) -> Disposition {
    let span = info_span!("spk", object = %request.object_name, format = %request.format);
    async {
        let disposition = match execute_inner(dialer, request, config).await {
            Ok(path) => Disposition::Success { path },
            Err(failure) => failure,
        };
        match &disposition {
            Disposition::Success { path } => info!(path = %path.display(), "run succeeded"),
            Disposition::Failure { reason, .. } => warn!(%reason, "run failed"),
        }
        disposition
    }
    .instrument(span)
    .await
}

async fn execute_inner<D: Dialer>(
    dialer: &mut D,
    request: &SpkRequest,
    config: &Config,
) -> std::result::Result<PathBuf, Disposition> {
    request.validate()?;
    let generated = generate(dialer, request, config).await?;
    let fetch = Fetch {
        remote_filename: generated.remote_filename,
        local_path: generated.local_filename,
        binary: request.format.is_binary(),
        email: request.email.clone(),
    };
    retrieve(dialer, &fetch, config).await
}

async fn generate<D: Dialer>(
    dialer: &mut D,
    request: &SpkRequest,
    config: &Config,
) -> std::result::Result<Generated, Disposition> {
    let session_config = config.session.clone().telnet(true);
    let transport = dial(dialer, &config.horizons.endpoint(), &session_config).await?;
    let mut session = SessionClient::new(transport, session_config)
        .with_quit_token(config.horizons.quit_token.clone());
    if config.logging.transcript_dir.is_some() {
        session = session.with_recorder(Recorder::new());
    }

    let result = horizons::run_session(&mut session, request, &config.horizons).await;
    save_transcript(&mut session, config, "horizons");
    Ok(result?)
}

async fn retrieve<D: Dialer>(
    dialer: &mut D,
    fetch: &Fetch,
    config: &Config,
) -> std::result::Result<PathBuf, Disposition> {
    let session_config = config
        .session
        .clone()
        .telnet(false)
        .line_ending(LineEnding::CrLf);
    let transport = dial(dialer, &config.retrieval.endpoint(), &session_config).await?;
    let mut connector = dialer.data_connector(&transport);
    let mut session = SessionClient::new(transport, session_config).with_quit_token(retrieval::QUIT_TOKEN);
    if config.logging.transcript_dir.is_some() {
        session = session.with_recorder(Recorder::new());
    }

    let result = retrieval::run_session(&mut session, &mut connector, fetch, &config.retrieval).await;
    save_transcript(&mut session, config, "retrieval");
    Ok(result?)
}

async fn dial<D: Dialer>(
    dialer: &mut D,
    endpoint: &str,
    config: &SessionConfig,
) -> std::result::Result<D::Control, Disposition> {
    dialer.dial(endpoint, config).await.map_err(|e| {
        warn!(endpoint, error = %e, "connection failed");
        Disposition::Failure {
            reason: FailureReason::ConnectionError,
            diagnostic: Some(e.to_string()),
        }
    })
}

/// Write the session's transcript into the configured directory.
fn save_transcript<T>(session: &mut SessionClient<T>, config: &Config, dialogue: &str)
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (Some(dir), Some(transcript)) = (&config.logging.transcript_dir, session.take_transcript()) else {
        return;
    };
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dir.join(format!("{dialogue}-{stamp}.ndjson"));
    match std::fs::create_dir_all(dir).and_then(|()| transcript.save(&path)) {
        Ok(()) => info!(path = %path.display(), events = transcript.len(), "transcript saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "transcript not saved"),
    }
}
