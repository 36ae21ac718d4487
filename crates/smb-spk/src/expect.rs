//! Expect pattern matching module.
//!
//! This module provides the core pattern matching functionality used by the
//! session client: pattern types, the text buffer, and the matcher that
//! combines them.

mod buffer;
mod matcher;
mod pattern;

pub use buffer::{DEFAULT_CAPACITY, TextBuffer};
pub use matcher::{Match, MatchResult, Matcher};
pub use pattern::{CompiledRegex, KindedPattern, Pattern, PatternKind, PatternMatch, PatternSet};
