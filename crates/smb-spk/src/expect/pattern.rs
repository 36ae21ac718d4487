//! Pattern types for expect operations.
//!
//! A [`Pattern`] is either a literal substring or a compiled regular
//! expression. Inside a [`PatternSet`] every pattern is tagged with a
//! [`PatternKind`] that tells the dialogue engine what a match means.

use regex::Regex;
use std::fmt;

/// What a pattern match means for the dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Normal protocol progress.
    Expected,
    /// The server reports a semantic problem.
    ErrorSignal,
    /// A transport-layer condition that may be retried.
    TransientFault,
}

impl PatternKind {
    /// Whether this kind reports a problem rather than progress.
    #[must_use]
    pub const fn is_fault(self) -> bool {
        !matches!(self, Self::Expected)
    }
}

/// A pattern that can be matched against remote output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact substring.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(pattern)?;
        Ok(Self::Regex(CompiledRegex::new(pattern.to_string(), regex)))
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
        }
    }

    /// Find the leftmost match of this pattern in `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => text.find(s.as_str()).map(|pos| PatternMatch {
                start: pos,
                end: pos + s.len(),
                captures: Vec::new(),
            }),
            Self::Regex(r) => r.match_in(text),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Create a new compiled regex.
    #[must_use]
    pub const fn new(pattern: String, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Leftmost match with its capture groups.
    ///
    /// Groups are kept positional: a group that did not participate is
    /// `None`, so group `n` is always at index `n - 1`.
    #[must_use]
    pub fn match_in(&self, text: &str) -> Option<PatternMatch> {
        let caps = self.regex.captures(text)?;
        let whole = caps.get(0)?;
        Some(PatternMatch {
            start: whole.start(),
            end: whole.end(),
            captures: caps
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
        })
    }
}

/// Result of a successful pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Start position of the match in the text.
    pub start: usize,
    /// End position of the match in the text.
    pub end: usize,
    /// Capture groups (for regex patterns), positional.
    pub captures: Vec<Option<String>>,
}

impl PatternMatch {
    /// Get the matched text from the searched text.
    #[must_use]
    pub fn as_str<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// A pattern together with its kind.
#[derive(Debug, Clone)]
pub struct KindedPattern {
    /// The pattern.
    pub pattern: Pattern,
    /// What a match means.
    pub kind: PatternKind,
}

/// An ordered set of kinded patterns.
///
/// List order is significant: it is the tie-break between patterns that
/// match at the same position.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<KindedPattern>,
}

impl PatternSet {
    /// Create a new empty pattern set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern of the given kind.
    pub fn add(&mut self, pattern: Pattern, kind: PatternKind) -> &mut Self {
        self.patterns.push(KindedPattern { pattern, kind });
        self
    }

    /// Add an [`PatternKind::Expected`] pattern.
    pub fn expected(&mut self, pattern: Pattern) -> &mut Self {
        self.add(pattern, PatternKind::Expected)
    }

    /// Get the number of patterns in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Get a pattern by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&KindedPattern> {
        self.patterns.get(index)
    }

    /// Get iterator over patterns.
    pub fn iter(&self) -> impl Iterator<Item = &KindedPattern> {
        self.patterns.iter()
    }

    /// Display form of the set, for timeout messages.
    #[must_use]
    pub fn describe(&self) -> String {
        self.patterns
            .iter()
            .map(|p| p.pattern.as_str())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Find the winning match in `text`.
    ///
    /// The earliest-starting match wins. At an equal start position a
    /// fault pattern beats an [`PatternKind::Expected`] one; otherwise the
    /// pattern listed first wins.
    #[must_use]
    pub fn find_match(&self, text: &str) -> Option<(usize, PatternMatch)> {
        let mut best: Option<(usize, PatternMatch)> = None;

        for (idx, kinded) in self.patterns.iter().enumerate() {
            let Some(m) = kinded.pattern.matches(text) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((best_idx, current)) => {
                    m.start < current.start
                        || (m.start == current.start
                            && kinded.kind.is_fault()
                            && !self.patterns[*best_idx].kind.is_fault())
                }
            };
            if better {
                best = Some((idx, m));
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches() {
        let pattern = Pattern::literal("Horizons>");
        let m = pattern.matches("Welcome\nHorizons> ").unwrap();
        assert_eq!(m.start, 8);
        assert_eq!(m.end, 17);
    }

    #[test]
    fn regex_captures_are_positional() {
        let pattern = Pattern::regex(r"(a)?(\d+)").unwrap();
        let m = pattern.matches("id 42").unwrap();
        assert_eq!(m.captures, vec![None, Some("42".to_string())]);
    }

    #[test]
    fn invalid_regex_fails_at_construction() {
        let err = Pattern::regex(r"File name\s*:\s*(\S+").unwrap_err();
        assert!(matches!(err, regex::Error::Syntax(_)));
    }

    #[test]
    fn earliest_position_wins() {
        let mut set = PatternSet::new();
        set.expected(Pattern::literal("world"))
            .expected(Pattern::literal("hello"));

        let (idx, _) = set.find_match("hello world").unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn list_order_breaks_ties_between_same_kind() {
        let mut set = PatternSet::new();
        set.expected(Pattern::literal("Add more"))
            .expected(Pattern::literal("Add"));

        let (idx, _) = set.find_match("Add more objects?").unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn fault_beats_expected_at_same_position() {
        let mut set = PatternSet::new();
        set.expected(Pattern::literal("Cannot"))
            .add(Pattern::literal("Cannot interpret"), PatternKind::ErrorSignal);

        let (idx, m) = set.find_match("Cannot interpret date").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(m.end, 16);
    }

    #[test]
    fn earlier_expected_beats_later_fault() {
        let mut set = PatternSet::new();
        set.add(Pattern::literal("ERROR"), PatternKind::ErrorSignal)
            .expected(Pattern::literal("ok"));

        let (idx, _) = set.find_match("ok then ERROR").unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn describe_joins_patterns() {
        let mut set = PatternSet::new();
        set.expected(Pattern::literal("a"))
            .add(Pattern::regex(r"b\d").unwrap(), PatternKind::TransientFault);
        assert_eq!(set.describe(), r"a | b\d");
    }
}
