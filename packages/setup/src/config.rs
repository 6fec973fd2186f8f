//! Setup flow configuration.
//!
//! Read from an optional TOML file, then overridden by environment
//! variables:
//!
//! ```toml
//! location_timeout_secs = 12
//! accuracy = "high"
//! ```
//!
//! * `DELIVERY_ZONES_LOCATION_TIMEOUT_SECS`
//! * `DELIVERY_ZONES_ACCURACY` (`low`, `balanced`, `high`)

use std::path::Path;
use std::time::Duration;

use delivery_zones_location::Accuracy;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding [`SetupConfig::location_timeout_secs`].
pub const TIMEOUT_ENV: &str = "DELIVERY_ZONES_LOCATION_TIMEOUT_SECS";
/// Environment variable overriding [`SetupConfig::accuracy`].
pub const ACCURACY_ENV: &str = "DELIVERY_ZONES_ACCURACY";

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`SetupConfig`].
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is out of range or unparseable.
    #[error("Invalid configuration: {message}")]
    Invalid {
        /// Description of the bad value.
        message: String,
    },
}

/// Tunables for the setup flow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetupConfig {
    /// Budget for one GPS fix, in seconds.
    pub location_timeout_secs: u64,
    /// Requested GPS accuracy.
    pub accuracy: Accuracy,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            location_timeout_secs: 12,
            accuracy: Accuracy::High,
        }
    }
}

impl SetupConfig {
    /// GPS fix budget as a [`Duration`].
    #[must_use]
    pub const fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }

    /// Parses a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document is malformed or invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()
    }

    /// Loads from an optional TOML file, then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or any value is
    /// invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by environment variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed or
    /// the result is invalid.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(TIMEOUT_ENV) {
            self.location_timeout_secs =
                value.trim().parse().map_err(|_| ConfigError::Invalid {
                    message: format!("{TIMEOUT_ENV}={value} is not a whole number of seconds"),
                })?;
        }
        if let Some(value) = lookup(ACCURACY_ENV) {
            self.accuracy = value.trim().parse().map_err(|_| ConfigError::Invalid {
                message: format!("{ACCURACY_ENV}={value} is not one of low, balanced, high"),
            })?;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.location_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "location_timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SetupConfig::default();
        assert_eq!(config.location_timeout(), Duration::from_secs(12));
        assert_eq!(config.accuracy, Accuracy::High);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(SetupConfig::from_toml_str("").unwrap(), SetupConfig::default());
    }

    #[test]
    fn parses_toml() {
        let config =
            SetupConfig::from_toml_str("location_timeout_secs = 15\naccuracy = \"balanced\"\n")
                .unwrap();
        assert_eq!(config.location_timeout_secs, 15);
        assert_eq!(config.accuracy, Accuracy::Balanced);
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            SetupConfig::from_toml_str("timeout = 3"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(matches!(
            SetupConfig::from_toml_str("location_timeout_secs = 0"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn env_overrides_file_values() {
        let config = SetupConfig::default()
            .with_overrides(|key| match key {
                TIMEOUT_ENV => Some("10".to_string()),
                ACCURACY_ENV => Some("low".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.location_timeout(), Duration::from_secs(10));
        assert_eq!(config.accuracy, Accuracy::Low);
    }

    #[test]
    fn bad_env_override_is_invalid() {
        let result = SetupConfig::default().with_overrides(|key| {
            (key == TIMEOUT_ENV).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
