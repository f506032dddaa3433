//! Configuration for credential synchronization

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CredentialsError, Result};
use crate::logging::LoggingConfig;

/// Environment variable overriding [`CredentialsConfig::label_selector`]
pub const LABEL_SELECTOR_ENV: &str = "ZLAYER_CREDENTIALS_LABEL_SELECTOR";

/// Environment variable overriding [`CredentialsConfig::reconnect_delay`]
pub const RECONNECT_DELAY_ENV: &str = "ZLAYER_CREDENTIALS_RECONNECT_DELAY";

const fn default_reconnect_delay() -> Duration {
    Duration::from_secs(5 * 60)
}

/// Credential synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialsConfig {
    /// Operator supplied selector narrowing which secrets are synced
    ///
    /// The credential type label requirement is always added on top.
    #[serde(default)]
    pub label_selector: Option<String>,

    /// Delay before relisting after the watch stream is lost
    #[serde(default = "default_reconnect_delay", with = "humantime_serde")]
    pub reconnect_delay: Duration,

    /// Logging setup for hosts that let this crate install the subscriber
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            label_selector: None,
            reconnect_delay: default_reconnect_delay(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CredentialsConfig {
    /// Create a config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operator label selector
    #[must_use]
    pub fn with_label_selector(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    /// Set the reconnect delay
    #[must_use]
    pub const fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Load defaults overridden by `ZLAYER_CREDENTIALS_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Config`] if the reconnect delay variable is
    /// not a valid duration.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    ///
    /// Blank values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Config`] if the reconnect delay is not a
    /// valid duration (`300`, `90s`, `5m`, `1h 30m`, ...).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(selector) = lookup(LABEL_SELECTOR_ENV) {
            self.label_selector = Some(selector);
        }

        if let Some(raw) = lookup(RECONNECT_DELAY_ENV) {
            self.reconnect_delay = parse_delay(&raw).map_err(|e| {
                CredentialsError::config(format!("{RECONNECT_DELAY_ENV}='{raw}': {e}"))
            })?;
        }

        Ok(self)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error message if the reconnect delay is zero.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.reconnect_delay.is_zero() {
            return Err("reconnect_delay must be > 0".to_string());
        }
        Ok(())
    }
}

fn parse_delay(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CredentialsConfig::default();
        assert!(config.label_selector.is_none());
        assert_eq!(config.reconnect_delay, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_humantime_delay() {
        let config: CredentialsConfig = serde_json::from_str(
            r#"{ "label_selector": "team=platform", "reconnect_delay": "90s" }"#,
        )
        .unwrap();
        assert_eq!(config.label_selector.as_deref(), Some("team=platform"));
        assert_eq!(config.reconnect_delay, Duration::from_secs(90));
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: CredentialsConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CredentialsConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = CredentialsConfig::default()
            .with_overrides(env(&[
                (LABEL_SELECTOR_ENV, "env in (prod, staging)"),
                (RECONNECT_DELAY_ENV, "2m"),
            ]))
            .unwrap();
        assert_eq!(
            config.label_selector.as_deref(),
            Some("env in (prod, staging)")
        );
        assert_eq!(config.reconnect_delay, Duration::from_secs(120));
    }

    #[test]
    fn test_env_plain_seconds_and_blank() {
        let config = CredentialsConfig::default()
            .with_label_selector("keep=me")
            .with_overrides(env(&[(LABEL_SELECTOR_ENV, "  "), (RECONNECT_DELAY_ENV, "45")]))
            .unwrap();
        assert_eq!(config.label_selector.as_deref(), Some("keep=me"));
        assert_eq!(config.reconnect_delay, Duration::from_secs(45));
    }

    #[test]
    fn test_env_invalid_delay() {
        let err = CredentialsConfig::default()
            .with_overrides(env(&[(RECONNECT_DELAY_ENV, "soon")]))
            .unwrap_err();
        assert!(matches!(err, CredentialsError::Config { .. }));
        assert!(err.to_string().contains(RECONNECT_DELAY_ENV));
    }

    #[test]
    fn test_validate_zero_delay() {
        let config = CredentialsConfig::default().with_reconnect_delay(Duration::ZERO);
        assert_eq!(
            config.validate().unwrap_err(),
            "reconnect_delay must be > 0"
        );
    }
}
