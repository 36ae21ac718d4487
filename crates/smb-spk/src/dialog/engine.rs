//! The dialogue engine.
//!
//! Runs a [`StageTable`] over a [`SessionClient`], one stage at a time:
//! send the entry line, wait for the stage's patterns, then classify the
//! winner. Every terminal path closes the session, which sends the quit
//! token exactly once.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{Instrument, debug, info, info_span, warn};

use super::context::{DialogueContext, Value};
use super::outcome::{Abort, Outcome};
use super::stage::{Arm, Narrow, Stage, StageTable};
use crate::error::{FailureReason, SessionError};
use crate::expect::{Match, PatternKind};
use crate::session::SessionClient;
use crate::util::Deadline;

/// Result of running a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The activation condition was false.
    Skipped,
    /// An expected pattern matched; captures are bound and the reply sent.
    Advanced(Match),
    /// A transient-fault pattern matched. The caller decides whether to
    /// retry.
    Fault(Match),
    /// The stage failed.
    Aborted(Abort),
}

/// Executes stage tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogueEngine;

impl DialogueEngine {
    /// Create a new engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Run every stage of `table` in order and close the session.
    ///
    /// A transient fault is terminal here; dialogues that recover from one
    /// drive [`step`](Self::step) themselves.
    pub async fn run<T>(
        &self,
        session: &mut SessionClient<T>,
        table: &StageTable,
        context: DialogueContext,
    ) -> Outcome
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let span = info_span!("dialogue", name = table.name());
        self.run_inner(session, table, context).instrument(span).await
    }

    async fn run_inner<T>(
        &self,
        session: &mut SessionClient<T>,
        table: &StageTable,
        mut context: DialogueContext,
    ) -> Outcome
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        for (index, stage) in table.iter().enumerate() {
            let abort = match self.step(session, index, stage, &mut context).await {
                StageOutcome::Skipped | StageOutcome::Advanced(_) => continue,
                StageOutcome::Aborted(abort) => abort,
                StageOutcome::Fault(m) => {
                    let reason = stage
                        .arm(m.pattern_index)
                        .and_then(|arm| arm.reason)
                        .unwrap_or(FailureReason::TransientFaultExhausted);
                    Abort::new(reason, index).with_diagnostic(m.matched.trim())
                }
            };
            warn!(stage = index, name = stage.name(), reason = %abort.reason, "dialogue aborted");
            session.close().await;
            return Outcome::Aborted(abort);
        }

        info!(stages = table.len(), "dialogue completed");
        session.close().await;
        Outcome::Completed { context }
    }

    /// Run one stage.
    pub async fn step<T>(
        &self,
        session: &mut SessionClient<T>,
        index: usize,
        stage: &Stage,
        context: &mut DialogueContext,
    ) -> StageOutcome
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if !stage.condition().holds(context) {
            debug!(stage = index, name = stage.name(), "stage skipped");
            return StageOutcome::Skipped;
        }
        debug!(stage = index, name = stage.name(), "stage entered");

        if let Some(template) = stage.entry() {
            let line = template.render(context);
            if let Err(e) = session.send_line(&line).await {
                return StageOutcome::Aborted(session_abort(&e, index));
            }
        }

        let deadline = Deadline::after(stage.wait_limit());
        let m = match session.await_match(stage.patterns(), deadline).await {
            Ok(m) => m,
            Err(e) => return StageOutcome::Aborted(session_abort(&e, index)),
        };

        let Some(arm) = stage.arm(m.pattern_index) else {
            return StageOutcome::Aborted(Abort::new(FailureReason::Transport, index));
        };

        match m.kind {
            PatternKind::ErrorSignal => {
                let reason = arm.reason.unwrap_or(FailureReason::ServerReportedInputError);
                StageOutcome::Aborted(Abort::new(reason, index).with_diagnostic(m.matched.trim()))
            }
            PatternKind::TransientFault => StageOutcome::Fault(m),
            PatternKind::Expected => {
                if let Err(abort) = bind(arm, &m, index, context) {
                    return StageOutcome::Aborted(abort);
                }
                if let Some(template) = &arm.reply {
                    let line = template.render(context);
                    if let Err(e) = session.send_line(&line).await {
                        return StageOutcome::Aborted(session_abort(&e, index));
                    }
                }
                StageOutcome::Advanced(m)
            }
        }
    }
}

/// Bind the arm's captures, then its derived values.
fn bind(arm: &Arm, m: &Match, index: usize, context: &mut DialogueContext) -> Result<(), Abort> {
    for capture in &arm.captures {
        let Some(raw) = m.group(capture.group) else {
            return Err(Abort::new(FailureReason::MalformedCapture, index)
                .with_diagnostic(m.matched.trim()));
        };
        let value = match capture.narrow {
            Narrow::Text => Value::Text(raw.to_string()),
            Narrow::Integer => match raw.trim().parse::<u64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => {
                    return Err(Abort::new(FailureReason::MalformedCapture, index)
                        .with_diagnostic(raw));
                }
            },
        };
        debug!(name = %capture.name, value = %value, "captured");
        context.bind(&capture.name, value);
    }
    for (name, template) in &arm.derived {
        let value = template.render(context);
        context.bind(name, Value::Text(value));
    }
    Ok(())
}

/// Classify a session error at stage `index`.
fn session_abort(error: &SessionError, index: usize) -> Abort {
    let reason = match error {
        SessionError::Timeout { .. } => FailureReason::StageTimeout { stage: index },
        SessionError::Eof { .. } => FailureReason::ConnectionClosed,
        SessionError::Connect { .. } => FailureReason::ConnectionError,
        _ => FailureReason::Transport,
    };
    let diagnostic = error
        .buffer()
        .and_then(|b| b.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .map_or_else(|| error.to_string(), str::to_string);
    Abort::new(reason, index).with_diagnostic(diagnostic)
}
