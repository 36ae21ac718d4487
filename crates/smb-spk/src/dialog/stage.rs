//! Stage definitions.
//!
//! A dialogue is an ordered [`StageTable`]. Each [`Stage`] waits for one of
//! its patterns and reacts according to the [`Arm`] attached to the
//! pattern that won.

use std::time::Duration;

use super::context::DialogueContext;
use crate::error::FailureReason;
use crate::expect::{Pattern, PatternKind, PatternSet};

/// A line template with `${name}` placeholders.
///
/// Placeholders resolve against captures first, then inputs. An unknown
/// name is left in place verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(String);

impl Template {
    /// Create a template.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute placeholders from `ctx`.
    #[must_use]
    pub fn render(&self, ctx: &DialogueContext) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();
        while let Some(open) = rest.find("${") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = &after[..close];
            match ctx.get(name) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[open..open + 2 + close + 1]),
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }
}

impl From<&str> for Template {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Template {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a captured group is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Narrow {
    /// Keep the text as-is.
    Text,
    /// Parse as an unsigned integer; failure aborts the dialogue.
    Integer,
}

/// Binds a regex group of the winning match into the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// Group number, 1-based.
    pub group: usize,
    /// Context name to bind.
    pub name: String,
    /// Storage form.
    pub narrow: Narrow,
}

/// What happens when a particular pattern wins.
#[derive(Debug, Clone, Default)]
pub struct Arm {
    /// Classification for fault patterns.
    pub reason: Option<FailureReason>,
    /// Captures bound on an expected match.
    pub captures: Vec<Capture>,
    /// Values bound after the captures, rendered from templates.
    pub derived: Vec<(String, Template)>,
    /// Line sent after an expected match.
    pub reply: Option<Template>,
}

/// When a stage runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Condition {
    /// Always run.
    #[default]
    Always,
    /// Run only when the name is not bound.
    Unless(String),
}

impl Condition {
    /// Evaluate against the context.
    #[must_use]
    pub fn holds(&self, ctx: &DialogueContext) -> bool {
        match self {
            Self::Always => true,
            Self::Unless(name) => !ctx.contains(name),
        }
    }
}

/// One expect/respond step.
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    send: Option<Template>,
    patterns: PatternSet,
    arms: Vec<Arm>,
    deadline: Option<Duration>,
    condition: Condition,
}

impl Stage {
    /// Create a stage with no patterns and no deadline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            send: None,
            patterns: PatternSet::new(),
            arms: Vec::new(),
            deadline: None,
            condition: Condition::Always,
        }
    }

    /// Send a line on stage entry.
    #[must_use]
    pub fn send(mut self, template: impl Into<Template>) -> Self {
        self.send = Some(template.into());
        self
    }

    /// Limit how long the stage waits. `None` waits indefinitely.
    #[must_use]
    pub const fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run only when `name` is not bound.
    #[must_use]
    pub fn unless(mut self, name: impl Into<String>) -> Self {
        self.condition = Condition::Unless(name.into());
        self
    }

    fn push(mut self, pattern: Pattern, kind: PatternKind, reason: Option<FailureReason>) -> Self {
        self.patterns.add(pattern, kind);
        self.arms.push(Arm {
            reason,
            ..Arm::default()
        });
        self
    }

    /// Add a pattern that means progress.
    #[must_use]
    pub fn expect(self, pattern: impl Into<Pattern>) -> Self {
        self.push(pattern.into(), PatternKind::Expected, None)
    }

    /// Add a pattern that means the server rejected something.
    #[must_use]
    pub fn error(self, pattern: impl Into<Pattern>, reason: FailureReason) -> Self {
        self.push(pattern.into(), PatternKind::ErrorSignal, Some(reason))
    }

    /// Add a pattern for a retryable transport fault.
    #[must_use]
    pub fn fault(self, pattern: impl Into<Pattern>, reason: FailureReason) -> Self {
        self.push(pattern.into(), PatternKind::TransientFault, Some(reason))
    }

    fn last_arm(&mut self) -> Option<&mut Arm> {
        self.arms.last_mut()
    }

    /// Reply with `template` when the most recently added pattern wins.
    #[must_use]
    pub fn reply(mut self, template: impl Into<Template>) -> Self {
        if let Some(arm) = self.last_arm() {
            arm.reply = Some(template.into());
        }
        self
    }

    /// Bind `group` of the most recently added pattern as `name`.
    #[must_use]
    pub fn capture(mut self, group: usize, name: impl Into<String>, narrow: Narrow) -> Self {
        let capture = Capture {
            group,
            name: name.into(),
            narrow,
        };
        if let Some(arm) = self.last_arm() {
            arm.captures.push(capture);
        }
        self
    }

    /// After the captures of the most recently added pattern, bind `name`
    /// to `template` rendered against the updated context.
    #[must_use]
    pub fn derive(mut self, name: impl Into<String>, template: impl Into<Template>) -> Self {
        let entry = (name.into(), template.into());
        if let Some(arm) = self.last_arm() {
            arm.derived.push(entry);
        }
        self
    }

    /// Stage name, used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entry template.
    #[must_use]
    pub const fn entry(&self) -> Option<&Template> {
        self.send.as_ref()
    }

    /// The stage's patterns.
    #[must_use]
    pub const fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// The arm for pattern `index`.
    #[must_use]
    pub fn arm(&self, index: usize) -> Option<&Arm> {
        self.arms.get(index)
    }

    /// The stage deadline.
    #[must_use]
    pub const fn wait_limit(&self) -> Option<Duration> {
        self.deadline
    }

    /// The activation condition.
    #[must_use]
    pub const fn condition(&self) -> &Condition {
        &self.condition
    }
}

/// An ordered list of stages.
#[derive(Debug, Clone, Default)]
pub struct StageTable {
    name: String,
    stages: Vec<Stage>,
}

impl StageTable {
    /// Create an empty table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Table name, used for the dialogue span.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Get a stage by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Iterate over stages in order.
    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.stages.iter()
    }
}
