use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};
use thiserror::Error;

use crate::timestamp::{parse_zone, TimeError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

/// Limits and capabilities of the expression sandbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxConfig {
    /// Maximum number of evaluation steps before the script is aborted.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Maximum nesting of expressions, calls and blocks while evaluating.
    /// Also bounds how deeply lists and objects may nest inside a value.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Largest value a script may build: bytes of text plus one per list
    /// element or object entry, counted through nested values.
    #[serde(default = "default_max_value_len")]
    pub max_value_len: usize,

    /// Wall-clock limit for a single evaluation.
    #[serde(default = "default_timeout", with = "duration_ms")]
    pub timeout: Duration,

    #[serde(default = "default_true")]
    pub allow_fetch: bool,

    #[serde(default = "default_fetch_timeout", with = "duration_ms")]
    pub fetch_timeout: Duration,

    /// IANA zone used by `new Date()` inside server-side scripts. UTC when
    /// absent or blank.
    #[serde(default)]
    pub time_zone: Option<String>,
}

impl SandboxConfig {
    /// The zone scripts see, surrounding whitespace ignored.
    pub fn zone(&self) -> Result<Tz, TimeError> {
        match self.time_zone.as_deref().map(str::trim) {
            None | Some("") => Ok(Tz::UTC),
            Some(name) => parse_zone(name),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_depth: default_max_depth(),
            max_value_len: default_max_value_len(),
            timeout: default_timeout(),
            allow_fetch: default_true(),
            fetch_timeout: default_fetch_timeout(),
            time_zone: None,
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox.max_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "sandbox.max_steps".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sandbox.max_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "sandbox.max_depth".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.sandbox.max_value_len == 0 {
            return Err(ConfigError::Invalid {
                field: "sandbox.max_value_len".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        self.sandbox
            .zone()
            .map_err(|e| ConfigError::Invalid {
                field: "sandbox.time_zone".to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }
}

fn default_max_steps() -> u64 {
    100_000
}
fn default_max_depth() -> usize {
    128
}
fn default_max_value_len() -> usize {
    1_000_000
}
fn default_timeout() -> Duration {
    Duration::from_millis(1000)
}
fn default_true() -> bool {
    true
}
fn default_fetch_timeout() -> Duration {
    Duration::from_millis(5000)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.sandbox.max_steps, 100_000);
        assert_eq!(config.sandbox.max_depth, 128);
        assert_eq!(config.sandbox.max_value_len, 1_000_000);
        assert_eq!(config.sandbox.timeout, Duration::from_millis(1000));
        assert!(config.sandbox.allow_fetch);
        assert_eq!(config.sandbox.fetch_timeout, Duration::from_millis(5000));
        assert_eq!(config.sandbox.time_zone, None);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = EngineConfig::from_str(r#"{"sandbox": {"max_steps": 50, "timeout": 250}}"#)
            .unwrap();
        assert_eq!(config.sandbox.max_steps, 50);
        assert_eq!(config.sandbox.timeout, Duration::from_millis(250));
        assert_eq!(config.sandbox.max_depth, 128);
        assert!(config.sandbox.allow_fetch);
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = EngineConfig::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_serialize_durations_as_millis() {
        let json = serde_json::to_value(EngineConfig::default()).unwrap();
        assert_eq!(json["sandbox"]["timeout"], 1000);
        assert_eq!(json["sandbox"]["fetch_timeout"], 5000);
    }

    #[test]
    fn test_invalid_time_zone_rejected() {
        let result = EngineConfig::from_str(r#"{"sandbox": {"time_zone": "Mars/Olympus"}}"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { ref field, .. }) if field == "sandbox.time_zone"
        ));
    }

    #[test]
    fn test_blank_and_padded_time_zones_accepted() {
        let config = EngineConfig::from_str(r#"{"sandbox": {"time_zone": ""}}"#).unwrap();
        assert_eq!(config.sandbox.zone(), Ok(Tz::UTC));

        let config = EngineConfig::from_str(r#"{"sandbox": {"time_zone": " Asia/Tokyo "}}"#)
            .unwrap();
        assert_eq!(config.sandbox.zone(), Ok(Tz::Asia__Tokyo));
    }

    #[test]
    fn test_zero_steps_rejected() {
        let result = EngineConfig::from_str(r#"{"sandbox": {"max_steps": 0}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        let result = EngineConfig::from_str(r#"{"sandbox": {"max_value_len": 0}}"#);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { ref field, .. }) if field == "sandbox.max_value_len"
        ));
    }

    #[test]
    fn test_malformed_json() {
        let result = EngineConfig::from_str("{ sandbox: ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"sandbox": {{"allow_fetch": false, "time_zone": "Europe/Paris"}}}}"#
        )
        .unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert!(!config.sandbox.allow_fetch);
        assert_eq!(config.sandbox.time_zone.as_deref(), Some("Europe/Paris"));
    }

    #[test]
    fn test_from_missing_file() {
        let result = EngineConfig::from_file("/nonexistent/flowvar.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
