//! Engine configuration.
//!
//! Everything is optional in the serialized form; missing keys take the same
//! defaults the engine ships with, so an empty `{}` document is a valid
//! configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::support::FillSettings;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Registration entry for one adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub name: String,
    pub priority: u8,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Adapters to register, cascade order by priority.
    pub adapters: Vec<AdapterConfig>,
    /// Bounded wait for a form field to become actionable, in seconds.
    pub field_wait_secs: u64,
    /// Settle interval after multi-step navigation, in seconds.
    pub settle_secs: u64,
    /// Pause between locating a field and typing into it, in milliseconds.
    pub input_pause_millis: u64,
    /// Back-off between retries on dynamically loaded fields, in seconds.
    pub retry_wait_secs: u64,
    pub max_form_steps: usize,
    pub max_fill_retries: usize,
    /// Concurrent in-flight application attempts.
    pub max_concurrency: usize,
    /// How long to wait for a human to clear a CAPTCHA, in seconds.
    pub captcha_wait_secs: u64,
    pub captcha_poll_secs: u64,
    /// Route by recorded per-URL performance before running detection.
    pub use_adaptive_routing: bool,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adapters: vec![
                AdapterConfig {
                    name: "greenhouse".to_string(),
                    priority: 1,
                    enabled: true,
                },
                AdapterConfig {
                    name: "lever".to_string(),
                    priority: 2,
                    enabled: true,
                },
                AdapterConfig {
                    name: "workable".to_string(),
                    priority: 3,
                    enabled: true,
                },
                AdapterConfig {
                    name: "generic".to_string(),
                    priority: 99,
                    enabled: true,
                },
            ],
            field_wait_secs: 10,
            settle_secs: 2,
            input_pause_millis: 300,
            retry_wait_secs: 1,
            max_form_steps: 10,
            max_fill_retries: 3,
            max_concurrency: 4,
            captcha_wait_secs: 300,
            captcha_poll_secs: 5,
            use_adaptive_routing: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_form_steps == 0 {
            return Err(ConfigError::Invalid(
                "max_form_steps must be at least 1".to_string(),
            ));
        }
        if self.captcha_poll_secs == 0 {
            return Err(ConfigError::Invalid(
                "captcha_poll_secs must be at least 1".to_string(),
            ));
        }
        for adapter in &self.adapters {
            if adapter.name.is_empty() {
                return Err(ConfigError::Invalid(
                    "adapter name must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Timing knobs in the shape the adapters consume.
    pub fn fill_settings(&self) -> FillSettings {
        FillSettings {
            field_wait: Duration::from_secs(self.field_wait_secs),
            input_pause: Duration::from_millis(self.input_pause_millis),
            settle: Duration::from_secs(self.settle_secs),
            retry_wait: Duration::from_secs(self.retry_wait_secs),
            max_fill_retries: self.max_fill_retries,
            max_form_steps: self.max_form_steps,
        }
    }

    pub fn captcha_wait(&self) -> Duration {
        Duration::from_secs(self.captcha_wait_secs)
    }

    pub fn captcha_poll(&self) -> Duration {
        Duration::from_secs(self.captcha_poll_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.adapters.len(), 4);
        assert!(config.use_adaptive_routing);
    }

    #[test]
    fn partial_document_overrides_only_named_keys() {
        let config =
            EngineConfig::from_json_str(r#"{"max_concurrency": 8, "use_adaptive_routing": false}"#)
                .unwrap();
        assert_eq!(config.max_concurrency, 8);
        assert!(!config.use_adaptive_routing);
        assert_eq!(config.field_wait_secs, 10);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{"max_concurrency": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn adapter_enabled_defaults_to_true() {
        let config = EngineConfig::from_json_str(
            r#"{"adapters": [{"name": "greenhouse", "priority": 1}]}"#,
        )
        .unwrap();
        assert!(config.adapters[0].enabled);
    }

    #[test]
    fn fill_settings_carry_the_configured_timings() {
        let config = EngineConfig::from_json_str(r#"{"field_wait_secs": 3}"#).unwrap();
        let settings = config.fill_settings();
        assert_eq!(settings.field_wait, Duration::from_secs(3));
        assert_eq!(settings.input_pause, Duration::from_millis(300));
    }
}
