//! Dialogue context: caller inputs plus captured values.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

/// A captured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Free text, such as a file name.
    Text(String),
    /// A value narrowed to an unsigned integer, such as an object ID.
    Integer(u64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// Named values visible to a dialogue run.
///
/// Inputs are fixed when the run starts. Captures are bound by the engine
/// as stages match and are write-once: the first binding of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialogueContext {
    inputs: BTreeMap<String, String>,
    captures: BTreeMap<String, Value>,
}

impl DialogueContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an input.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Get an input.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).map(String::as_str)
    }

    /// Get a captured value.
    #[must_use]
    pub fn capture(&self, name: &str) -> Option<&Value> {
        self.captures.get(name)
    }

    /// Look a name up, captures first, rendered as text.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        self.captures
            .get(name)
            .map(ToString::to_string)
            .or_else(|| self.inputs.get(name).cloned())
    }

    /// Get a captured integer.
    #[must_use]
    pub fn get_u64(&self, name: &str) -> Option<u64> {
        match self.captures.get(name) {
            Some(Value::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    /// Whether `name` is bound as an input or a capture.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.captures.contains_key(name) || self.inputs.contains_key(name)
    }

    /// Bind a capture. Returns `false` and keeps the existing value if the
    /// name is already bound.
    pub fn bind(&mut self, name: &str, value: Value) -> bool {
        if let Some(existing) = self.captures.get(name) {
            if *existing != value {
                warn!(name, %existing, rejected = %value, "capture already bound");
            }
            return false;
        }
        self.captures.insert(name.to_string(), value);
        true
    }

    /// Iterate over captures in name order.
    pub fn captures(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.captures.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_are_write_once() {
        let mut ctx = DialogueContext::new();
        assert!(ctx.bind("object_id", Value::Integer(1_000_003)));
        assert!(!ctx.bind("object_id", Value::Integer(42)));
        assert_eq!(ctx.get_u64("object_id"), Some(1_000_003));
    }

    #[test]
    fn captures_shadow_inputs() {
        let mut ctx = DialogueContext::new().with_input("name", "input");
        assert_eq!(ctx.get("name").as_deref(), Some("input"));
        ctx.bind("name", Value::Text("captured".into()));
        assert_eq!(ctx.get("name").as_deref(), Some("captured"));
        assert_eq!(ctx.input("name"), Some("input"));
    }

    #[test]
    fn text_capture_is_not_an_integer() {
        let mut ctx = DialogueContext::new();
        ctx.bind("remote_filename", Value::Text("wld1234.bsp".into()));
        assert_eq!(ctx.get_u64("remote_filename"), None);
        assert!(ctx.contains("remote_filename"));
        assert!(!ctx.contains("object_id"));
    }
}
