//! The FTP retrieval dialogue.
//!
//! Logs in anonymously, selects the transfer type and directory, then
//! fetches one file. If the data connection cannot be opened (`425`) the
//! fetch is re-issued once in passive mode; the outcome of that retry is
//! final.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{Instrument, debug, info, info_span, warn};

use super::data::{DataConnector, parse_passive, port_argument};
use crate::config::RetrievalConfig;
use crate::dialog::{Abort, DialogueContext, DialogueEngine, Stage, StageOutcome, StageTable};
use crate::error::FailureReason;
use crate::expect::Pattern;
use crate::session::SessionClient;

/// Line sent to end the FTP session.
pub const QUIT_TOKEN: &str = "QUIT";

const USER: &str = "user";
const PASSWORD: &str = "password";
const TRANSFER_TYPE: &str = "transfer_type";
const DIRECTORY: &str = "directory";
const REMOTE_FILENAME: &str = "remote_filename";
const DATA_PORT: &str = "data_port";

/// Stage indices after the login table.
const MODE_STAGE: usize = 5;
const RETR_STAGE: usize = 6;
const COMPLETE_STAGE: usize = 7;

const COPY_CHUNK: usize = 64 * 1024;

/// One file to fetch.
#[derive(Clone, PartialEq, Eq)]
pub struct Fetch {
    /// Name in the publication directory.
    pub remote_filename: String,
    /// Final local path.
    pub local_path: PathBuf,
    /// Use image (binary) transfer type.
    pub binary: bool,
    /// Contact address, sent as the anonymous password.
    pub email: String,
}

impl std::fmt::Debug for Fetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetch")
            .field("remote_filename", &self.remote_filename)
            .field("local_path", &self.local_path)
            .field("binary", &self.binary)
            .finish_non_exhaustive()
    }
}

/// Remove characters that would end or corrupt an FTP command line.
#[must_use]
pub fn escape_credential(credential: &str) -> String {
    credential
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect()
}

/// Path of the partial file written during the transfer.
#[must_use]
pub fn part_path(local: &Path) -> PathBuf {
    let mut name = local.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// A final reply line with the given code (which may be a regex class).
fn reply(code: &str) -> Result<Pattern, regex::Error> {
    Pattern::regex(&format!(r"(?m)^{code} [^\r\n]*\r?\n"))
}

/// Build the login table: greeting, `USER`, `PASS`, `TYPE`, `CWD`.
pub fn login_table(config: &RetrievalConfig) -> Result<StageTable, regex::Error> {
    let wait = Some(config.stage_timeout);
    let auth = FailureReason::RetrievalAuthFailed;

    Ok(StageTable::new("retrieval")
        .stage(
            Stage::new("greeting")
                .deadline(wait)
                .expect(reply("220")?)
                .error(reply("421")?, FailureReason::ConnectionError),
        )
        .stage(
            Stage::new("user")
                .deadline(wait)
                .send("USER ${user}")
                .expect(reply("331")?)
                .error(reply("530")?, auth),
        )
        .stage(
            Stage::new("pass")
                .deadline(wait)
                .send("PASS ${password}")
                .expect(reply("230")?)
                .error(reply("530")?, auth)
                .error(Pattern::literal("Login failed"), auth),
        )
        .stage(
            Stage::new("type")
                .deadline(wait)
                .send("TYPE ${transfer_type}")
                .expect(reply("200")?),
        )
        .stage(
            Stage::new("cwd")
                .deadline(wait)
                .send("CWD ${directory}")
                .expect(reply("250")?)
                .error(reply("550")?, FailureReason::RemoteFileNotFound),
        ))
}

/// Stages of one fetch attempt.
#[derive(Debug, Clone)]
struct FetchStages {
    port: Stage,
    pasv: Stage,
    retr: Stage,
    complete: Stage,
}

impl FetchStages {
    fn new(config: &RetrievalConfig) -> Result<Self, regex::Error> {
        let wait = Some(config.stage_timeout);
        Ok(Self {
            port: Stage::new("port")
                .deadline(wait)
                .send("PORT ${data_port}")
                .expect(reply("200")?)
                .error(reply(r"5\d\d")?, FailureReason::Transport),
            pasv: Stage::new("pasv")
                .deadline(wait)
                .send("PASV")
                .expect(Pattern::regex(
                    r"(?m)^227 [^\r\n]*?(\d+),(\d+),(\d+),(\d+),(\d+),(\d+)[^\r\n]*\r?\n",
                )?)
                .error(reply(r"5\d\d")?, FailureReason::Transport),
            retr: Stage::new("retr")
                .deadline(wait)
                .send("RETR ${remote_filename}")
                .expect(reply("1[25]0")?)
                .error(reply("550")?, FailureReason::RemoteFileNotFound)
                .fault(reply("425")?, FailureReason::TransientFaultExhausted),
            complete: Stage::new("complete")
                .deadline(wait)
                .expect(reply("226")?)
                .expect(reply("250")?)
                .error(reply(r"4\d\d")?, FailureReason::Transport),
        })
    }
}

fn context(fetch: &Fetch, config: &RetrievalConfig) -> DialogueContext {
    DialogueContext::new()
        .with_input(USER, config.user.clone())
        .with_input(PASSWORD, escape_credential(&fetch.email))
        .with_input(TRANSFER_TYPE, if fetch.binary { "I" } else { "A" })
        .with_input(DIRECTORY, config.directory.clone())
        .with_input(REMOTE_FILENAME, fetch.remote_filename.clone())
}

/// How a fetch attempt failed.
enum Attempt {
    /// The data connection could not be opened; retryable.
    Fault(Abort),
    /// Anything else.
    Fatal(Abort),
}

/// Classify a non-advancing stage result.
fn failed(outcome: StageOutcome, index: usize) -> Attempt {
    match outcome {
        StageOutcome::Fault(m) => Attempt::Fault(
            Abort::new(FailureReason::TransientFaultExhausted, index).with_diagnostic(m.matched.trim()),
        ),
        StageOutcome::Aborted(abort) => Attempt::Fatal(abort),
        StageOutcome::Skipped | StageOutcome::Advanced(_) => {
            Attempt::Fatal(Abort::new(FailureReason::Transport, index))
        }
    }
}

fn io_abort(reason: FailureReason, index: usize, error: &io::Error) -> Abort {
    Abort::new(reason, index).with_diagnostic(error.to_string())
}

/// Run the dialogue over an open control session and fetch the file.
///
/// On success the artifact is at `fetch.local_path`. On failure no
/// partial file is left behind. The session is closed on return.
pub async fn run_session<T, C>(
    session: &mut SessionClient<T>,
    connector: &mut C,
    fetch: &Fetch,
    config: &RetrievalConfig,
) -> Result<PathBuf, Abort>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    C: DataConnector,
{
    let span = info_span!("dialogue", name = "retrieval");
    async {
        let part = part_path(&fetch.local_path);
        let result = drive(session, connector, fetch, config, &part).await;
        session.close().await;

        match result {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::rename(&part, &fetch.local_path).await {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(io_abort(FailureReason::LocalFile, COMPLETE_STAGE, &e));
                }
                info!(bytes, path = %fetch.local_path.display(), "artifact retrieved");
                Ok(fetch.local_path.clone())
            }
            Err(abort) => {
                let _ = tokio::fs::remove_file(&part).await;
                warn!(stage = abort.stage, reason = %abort.reason, "dialogue aborted");
                Err(abort)
            }
        }
    }
    .instrument(span)
    .await
}

async fn drive<T, C>(
    session: &mut SessionClient<T>,
    connector: &mut C,
    fetch: &Fetch,
    config: &RetrievalConfig,
    part: &Path,
) -> Result<u64, Abort>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    C: DataConnector,
{
    let tables = login_table(config).and_then(|login| Ok((login, FetchStages::new(config)?)));
    let (login, stages) = match tables {
        Ok(tables) => tables,
        Err(e) => return Err(Abort::new(FailureReason::Transport, 0).with_diagnostic(e.to_string())),
    };

    let engine = DialogueEngine::new();
    let mut ctx = context(fetch, config);
    for (index, stage) in login.iter().enumerate() {
        match engine.step(session, index, stage, &mut ctx).await {
            StageOutcome::Skipped | StageOutcome::Advanced(_) => {}
            other => {
                return Err(match failed(other, index) {
                    Attempt::Fault(abort) | Attempt::Fatal(abort) => abort,
                });
            }
        }
    }

    let mut passive = config.passive;
    let mut retried = false;
    loop {
        match fetch_once(session, connector, &stages, &ctx, passive, part, config).await {
            Ok(bytes) => return Ok(bytes),
            Err(Attempt::Fault(abort)) if !retried => {
                warn!(
                    diagnostic = abort.diagnostic.as_deref().unwrap_or_default(),
                    "data connection failed, retrying once in passive mode"
                );
                retried = true;
                passive = true;
                let _ = tokio::fs::remove_file(part).await;
            }
            Err(Attempt::Fault(abort)) => return Err(abort),
            Err(Attempt::Fatal(abort)) => return Err(abort),
        }
    }
}

async fn fetch_once<T, C>(
    session: &mut SessionClient<T>,
    connector: &mut C,
    stages: &FetchStages,
    ctx: &DialogueContext,
    passive: bool,
    part: &Path,
    config: &RetrievalConfig,
) -> Result<u64, Attempt>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    C: DataConnector,
{
    let engine = DialogueEngine::new();
    let mut ctx = ctx.clone();
    let transfer = crate::util::Deadline::from_now(config.transfer_timeout);
    let timed_out = || Attempt::Fatal(Abort::new(FailureReason::StageTimeout { stage: RETR_STAGE }, RETR_STAGE));

    let stream = if passive {
        let m = match engine.step(session, MODE_STAGE, &stages.pasv, &mut ctx).await {
            StageOutcome::Advanced(m) => m,
            other => return Err(failed(other, MODE_STAGE)),
        };
        let fields: Vec<&str> = (1..=6).filter_map(|g| m.group(g)).collect();
        let Some(addr) = parse_passive(&fields) else {
            return Err(Attempt::Fatal(
                Abort::new(FailureReason::MalformedCapture, MODE_STAGE).with_diagnostic(m.matched.trim()),
            ));
        };
        debug!(%addr, "passive data address");
        match transfer.apply(connector.connect(addr)).await {
            Some(Ok(stream)) => Some(stream),
            Some(Err(e)) => {
                return Err(Attempt::Fatal(io_abort(FailureReason::Transport, MODE_STAGE, &e)));
            }
            None => return Err(timed_out()),
        }
    } else {
        let addr = connector
            .listen()
            .await
            .map_err(|e| Attempt::Fatal(io_abort(FailureReason::Transport, MODE_STAGE, &e)))?;
        ctx = ctx.with_input(DATA_PORT, port_argument(addr));
        match engine.step(session, MODE_STAGE, &stages.port, &mut ctx).await {
            StageOutcome::Advanced(_) => None,
            other => return Err(failed(other, MODE_STAGE)),
        }
    };

    match engine.step(session, RETR_STAGE, &stages.retr, &mut ctx).await {
        StageOutcome::Advanced(_) => {}
        other => return Err(failed(other, RETR_STAGE)),
    }

    let mut stream = match stream {
        Some(stream) => stream,
        None => match transfer.apply(connector.accept()).await {
            Some(Ok(stream)) => stream,
            Some(Err(e)) => {
                return Err(Attempt::Fatal(io_abort(FailureReason::Transport, RETR_STAGE, &e)));
            }
            None => return Err(timed_out()),
        },
    };

    let bytes = match transfer.apply(write_part(&mut stream, part)).await {
        Some(Ok(bytes)) => bytes,
        Some(Err(abort)) => return Err(Attempt::Fatal(abort)),
        None => return Err(timed_out()),
    };
    drop(stream);
    debug!(bytes, "data transfer finished");

    match engine.step(session, COMPLETE_STAGE, &stages.complete, &mut ctx).await {
        StageOutcome::Advanced(_) => Ok(bytes),
        other => Err(failed(other, COMPLETE_STAGE)),
    }
}

/// Copy the data stream into `part`.
async fn write_part<S: AsyncRead + Unpin>(stream: &mut S, part: &Path) -> Result<u64, Abort> {
    let mut file = File::create(part)
        .await
        .map_err(|e| io_abort(FailureReason::LocalFile, RETR_STAGE, &e))?;
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0u64;
    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| io_abort(FailureReason::Transport, RETR_STAGE, &e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .await
            .map_err(|e| io_abort(FailureReason::LocalFile, RETR_STAGE, &e))?;
        total += n as u64;
    }
    file.sync_all()
        .await
        .map_err(|e| io_abort(FailureReason::LocalFile, RETR_STAGE, &e))?;
    Ok(total)
}
