//! Pattern matching engine for expect operations.
//!
//! The [`Matcher`] owns the text received but not yet consumed by a stage
//! and classifies it against a [`PatternSet`].

use super::buffer::TextBuffer;
use super::pattern::{PatternKind, PatternSet};

/// The pattern matching engine.
#[derive(Debug, Clone)]
pub struct Matcher {
    buffer: TextBuffer,
}

impl Matcher {
    /// Create a new matcher with the specified buffer size.
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: TextBuffer::new(buffer_size),
        }
    }

    /// Append data to the buffer.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.append(data);
    }

    /// Get the current unconsumed text.
    #[must_use]
    pub fn buffer_str(&self) -> &str {
        self.buffer.as_str()
    }

    /// Get the underlying buffer.
    #[must_use]
    pub const fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Try to match the pattern set against the unconsumed text.
    #[must_use]
    pub fn try_match(&self, patterns: &PatternSet) -> Option<MatchResult> {
        let (pattern_index, m) = patterns.find_match(self.buffer.as_str())?;
        let kind = patterns.get(pattern_index)?.kind;
        Some(MatchResult {
            pattern_index,
            kind,
            start: m.start,
            end: m.end,
            captures: m.captures,
        })
    }

    /// Consume text up to and including the match.
    pub fn consume_match(&mut self, result: &MatchResult) -> Match {
        let before = self.buffer.consume(result.start);
        let matched = self.buffer.consume(result.end - result.start);
        Match {
            pattern_index: result.pattern_index,
            kind: result.kind,
            matched,
            before,
            captures: result.captures.clone(),
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(super::buffer::DEFAULT_CAPACITY)
    }
}

/// Position of a pattern match in the unconsumed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the pattern that matched.
    pub pattern_index: usize,
    /// Kind of the pattern that matched.
    pub kind: PatternKind,
    /// Start position in the buffer.
    pub start: usize,
    /// End position in the buffer.
    pub end: usize,
    /// Capture groups, positional.
    pub captures: Vec<Option<String>>,
}

/// A consumed match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Index of the pattern that matched.
    pub pattern_index: usize,
    /// Kind of the pattern that matched.
    pub kind: PatternKind,
    /// The full text that matched.
    pub matched: String,
    /// Text that preceded the match since the last consumption.
    pub before: String,
    /// Capture groups, positional (group 1 at index 0).
    pub captures: Vec<Option<String>>,
}

impl Match {
    /// Get capture group `group` (1-based, as in the regex).
    #[must_use]
    pub fn group(&self, group: usize) -> Option<&str> {
        group
            .checked_sub(1)
            .and_then(|i| self.captures.get(i))
            .and_then(Option::as_deref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::Pattern;

    #[test]
    fn consume_splits_before_and_matched() {
        let mut matcher = Matcher::new(1024);
        matcher.append(b"banner\nHorizons> trailing");

        let mut set = PatternSet::new();
        set.expected(Pattern::literal("Horizons> "));

        let result = matcher.try_match(&set).unwrap();
        let m = matcher.consume_match(&result);
        assert_eq!(m.before, "banner\n");
        assert_eq!(m.matched, "Horizons> ");
        assert_eq!(matcher.buffer_str(), "trailing");
    }

    #[test]
    fn match_spans_multiple_appends() {
        let mut matcher = Matcher::new(1024);
        let mut set = PatternSet::new();
        set.expected(Pattern::regex(r"ID:\s+(\d+)\s").unwrap());

        matcher.append(b"Assigned SPK object ID: 100");
        assert!(matcher.try_match(&set).is_none());
        matcher.append(b"0003\n");

        let result = matcher.try_match(&set).unwrap();
        let m = matcher.consume_match(&result);
        assert_eq!(m.group(1), Some("1000003"));
        assert_eq!(m.group(0), None);
        assert_eq!(m.group(2), None);
    }

    #[test]
    fn reports_kind_of_winner() {
        let mut matcher = Matcher::default();
        matcher.append(b"550 No such file\r\n");
        let mut set = PatternSet::new();
        set.expected(Pattern::literal("226"))
            .add(Pattern::literal("550"), PatternKind::ErrorSignal);

        let result = matcher.try_match(&set).unwrap();
        assert_eq!(result.kind, PatternKind::ErrorSignal);
    }
}
