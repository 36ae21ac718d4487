//! Environment-based configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::ConfigError;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "SMB_SPK";

/// Environment variable reader.
///
/// Values set with [`EnvConfig::with`] shadow the process environment,
/// which lets tests exercise overrides without mutating global state.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    overrides: HashMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Create a new environment config reader.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            overrides: HashMap::new(),
        }
    }

    /// Shadow a variable with a fixed value.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.overrides.insert(self.var_name(name), value.into());
        self
    }

    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        self.overrides
            .get(&var_name)
            .cloned()
            .or_else(|| std::env::var(&var_name).ok())
    }

    /// Get a parsed value. A value that does not parse is an error rather
    /// than silently ignored.
    pub fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidEnv {
                    name: self.var_name(name),
                    value,
                }),
        }
    }

    /// Get a boolean value.
    pub fn bool(&self, name: &str) -> Result<Option<bool>, ConfigError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidEnv {
                    name: self.var_name(name),
                    value,
                }),
            },
        }
    }

    /// Get a duration in seconds.
    pub fn duration_secs(&self, name: &str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parsed::<u64>(name)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn var_name_is_prefixed_and_uppercased() {
        let env = EnvConfig::default();
        assert_eq!(env.var_name("horizons_port"), "SMB_SPK_HORIZONS_PORT");
        assert_eq!(EnvConfig::new("").var_name("log"), "LOG");
    }

    #[test]
    fn overrides_apply_to_config() {
        let env = EnvConfig::new("SMB_SPK_TEST_APPLY")
            .with("HORIZONS_HOST", "localhost")
            .with("HORIZONS_PORT", "16775")
            .with("HORIZONS_COMPUTATION_TIMEOUT", "300")
            .with("RETRIEVAL_PASSIVE", "yes");

        let config = Config::default().apply_env(&env).unwrap();
        assert_eq!(config.horizons.host, "localhost");
        assert_eq!(config.horizons.port, 16775);
        assert_eq!(
            config.horizons.computation_timeout,
            Some(Duration::from_secs(300))
        );
        assert!(config.retrieval.passive);
    }

    #[test]
    fn unparsable_value_is_an_error() {
        let env = EnvConfig::new("SMB_SPK_TEST_BAD").with("HORIZONS_PORT", "telnet");
        let err = Config::default().apply_env(&env).unwrap_err();
        match err {
            ConfigError::InvalidEnv { name, value } => {
                assert_eq!(name, "SMB_SPK_TEST_BAD_HORIZONS_PORT");
                assert_eq!(value, "telnet");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bool_rejects_garbage() {
        let env = EnvConfig::new("SMB_SPK_TEST_BOOL")
            .with("A", "off")
            .with("B", "maybe");
        assert_eq!(env.bool("A").unwrap(), Some(false));
        assert!(env.bool("B").is_err());
        assert_eq!(env.bool("C").unwrap(), None);
    }
}
