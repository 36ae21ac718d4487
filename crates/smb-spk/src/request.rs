//! The caller's request.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, FailureReason};

/// Requested SPK file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpkFormat {
    /// Transfer (text) format.
    Text,
    /// Binary, legacy type 1.
    Type1,
    /// Binary, modern type 21.
    Type21,
    /// Binary, server default type.
    #[default]
    Binary,
}

impl SpkFormat {
    /// Code sent at the format prompt.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Text => "A",
            Self::Type1 => "1",
            Self::Type21 => "21",
            Self::Binary => "B",
        }
    }

    /// Canonical file suffix, without the dot.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Text => "xsp",
            _ => "bsp",
        }
    }

    /// Whether the artifact is binary.
    #[must_use]
    pub const fn is_binary(self) -> bool {
        !matches!(self, Self::Text)
    }
}

impl fmt::Display for SpkFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Type1 => "type1",
            Self::Type21 => "type21",
            Self::Binary => "binary",
        })
    }
}

/// Everything the caller supplies for one run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpkRequest {
    /// Output format.
    #[serde(default)]
    pub format: SpkFormat,
    /// Name given to the object on the server.
    pub object_name: String,
    /// Span start date, passed through verbatim.
    pub start: String,
    /// Span stop date, passed through verbatim.
    pub stop: String,
    /// Osculating element assignments, passed through verbatim.
    pub elements: String,
    /// Contact e-mail address.
    pub email: String,
    /// Local file name override.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl SpkRequest {
    /// Parse a request from TOML.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a request file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check the request before any connection is made.
    ///
    /// Only the contact address is checked locally; dates and elements are
    /// validated by the server.
    pub fn validate(&self) -> Result<(), FailureReason> {
        validate_contact_address(&self.email)
    }
}

impl fmt::Debug for SpkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpkRequest")
            .field("format", &self.format)
            .field("object_name", &self.object_name)
            .field("start", &self.start)
            .field("stop", &self.stop)
            .field("elements", &self.elements)
            .field("email", &"<redacted>")
            .field("output", &self.output)
            .finish()
    }
}

/// Check that `address` contains an `@` that is not its first character.
pub fn validate_contact_address(address: &str) -> Result<(), FailureReason> {
    match address.find('@') {
        Some(pos) if pos > 0 => Ok(()),
        _ => Err(FailureReason::InvalidContactAddress),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_address_shape() {
        assert!(validate_contact_address("user@example.org").is_ok());
        assert!(validate_contact_address("a@b").is_ok());
        assert!(validate_contact_address("user.example.org").is_err());
        assert!(validate_contact_address("@example.org").is_err());
        assert!(validate_contact_address("").is_err());
    }

    #[test]
    fn suffixes() {
        assert_eq!(SpkFormat::Text.suffix(), "xsp");
        assert_eq!(SpkFormat::Type1.suffix(), "bsp");
        assert_eq!(SpkFormat::Type21.suffix(), "bsp");
        assert_eq!(SpkFormat::Binary.suffix(), "bsp");
        assert!(!SpkFormat::Text.is_binary());
    }

    #[test]
    fn parses_from_toml() {
        let request = SpkRequest::from_toml_str(
            r#"
            format = "type21"
            object_name = "2024 XR"
            start = "2024-01-01"
            stop = "2024-06-01"
            elements = "EPOCH=2460310.5 EC=.0714 QR=1.21 TP=2460200.1 OM=21.3 W=63.1 IN=5.4"
            email = "observer@example.org"
            "#,
        )
        .unwrap();
        assert_eq!(request.format, SpkFormat::Type21);
        assert_eq!(request.output, None);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn debug_redacts_email() {
        let request = SpkRequest {
            format: SpkFormat::Binary,
            object_name: "x".into(),
            start: "2024-01-01".into(),
            stop: "2024-06-01".into(),
            elements: "EC=0.1".into(),
            email: "secret@example.org".into(),
            output: None,
        };
        assert!(!format!("{request:?}").contains("secret"));
    }
}
