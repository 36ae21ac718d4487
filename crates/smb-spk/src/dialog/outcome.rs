//! Dialogue outcomes.

use std::fmt;

use super::context::DialogueContext;
use crate::error::FailureReason;

/// Why and where a dialogue was abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abort {
    /// Classified reason.
    pub reason: FailureReason,
    /// Index of the stage that failed.
    pub stage: usize,
    /// The server's own text, verbatim, when there was any.
    pub diagnostic: Option<String>,
}

impl Abort {
    /// Create an abort without diagnostic text.
    #[must_use]
    pub const fn new(reason: FailureReason, stage: usize) -> Self {
        Self {
            reason,
            stage,
            diagnostic: None,
        }
    }

    /// Attach diagnostic text. Blank text is dropped.
    #[must_use]
    pub fn with_diagnostic(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.diagnostic = Some(text);
        }
        self
    }
}

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (stage {})", self.reason, self.stage)?;
        if let Some(text) = &self.diagnostic {
            write!(f, ": {text}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Abort {}

/// Terminal state of a dialogue run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Every stage ran; the context holds inputs and captures.
    Completed {
        /// The final context.
        context: DialogueContext,
    },
    /// A stage faulted.
    Aborted(Abort),
}

impl Outcome {
    /// Whether the run completed.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// The final context of a completed run.
    #[must_use]
    pub const fn context(&self) -> Option<&DialogueContext> {
        match self {
            Self::Completed { context } => Some(context),
            Self::Aborted(_) => None,
        }
    }

    /// The abort of a failed run.
    #[must_use]
    pub const fn abort(&self) -> Option<&Abort> {
        match self {
            Self::Completed { .. } => None,
            Self::Aborted(abort) => Some(abort),
        }
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<DialogueContext, Abort> {
        match self {
            Self::Completed { context } => Ok(context),
            Self::Aborted(abort) => Err(abort),
        }
    }
}
