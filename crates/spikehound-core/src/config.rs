//! Service configuration
//!
//! Built once at process start (defaults, then an optional TOML file, then
//! environment overrides) and injected into every component. Nothing else
//! in this crate reads the environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use spikehound_security::{DiscordSignatureVerifier, ReplayWindow, SlackSignatureVerifier};
use std::path::Path;
use std::time::Duration;

/// Environment variable names
pub mod env {
    pub const IDEMPOTENCY_TTL_SECONDS: &str = "SPIKEHOUND_IDEMPOTENCY_TTL_SECONDS";
    pub const USE_DURABLE: &str = "SPIKEHOUND_USE_DURABLE";
    pub const ENABLE_REMEDIATION_EXECUTION: &str = "SPIKEHOUND_ENABLE_REMEDIATION_EXECUTION";
    pub const CLOUD_ENABLED: &str = "SPIKEHOUND_CLOUD_ENABLED";
    pub const PROCEDURE_TIMEOUT_SECONDS: &str = "SPIKEHOUND_PROCEDURE_TIMEOUT_SECONDS";
    pub const REPLAY_WINDOW_SECONDS: &str = "SPIKEHOUND_REPLAY_WINDOW_SECONDS";
    pub const SLACK_SIGNING_SECRET: &str = "SLACK_SIGNING_SECRET";
    pub const DISCORD_PUBLIC_KEY: &str = "DISCORD_INTERACTIONS_PUBLIC_KEY";
    pub const SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
    pub const DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
}

/// Spikehound configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikehoundConfig {
    /// Idempotency window for duplicate alert deliveries
    pub idempotency_ttl_secs: u64,
    /// Accept alerts and investigate in the background
    pub use_durable: bool,
    /// Run approved remediation actions; off means uniform skipped outcomes
    pub execution_enabled: bool,
    /// Allow procedures to call live cloud APIs
    pub cloud_enabled: bool,
    /// Per-procedure timeout
    pub procedure_timeout_secs: u64,
    /// Maximum signed-timestamp skew
    pub replay_window_secs: u64,
    pub slack_signing_secret: Option<String>,
    pub discord_public_key: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub discord_webhook_url: Option<String>,
}

impl SpikehoundConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a TOML file, then overlay the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.overlay(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment, validated
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with `lookup`, validated
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let config = Self::default().overlay(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply overrides from a key lookup (normally the environment)
    #[must_use]
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(env::IDEMPOTENCY_TTL_SECONDS) {
            if let Ok(secs) = raw.trim().parse::<i64>() {
                self.idempotency_ttl_secs = u64::try_from(secs.max(0)).unwrap_or(0);
            }
        }
        if let Some(raw) = lookup(env::USE_DURABLE) {
            self.use_durable = parse_flag(&raw);
        }
        if let Some(raw) = lookup(env::ENABLE_REMEDIATION_EXECUTION) {
            self.execution_enabled = parse_flag(&raw);
        }
        if let Some(raw) = lookup(env::CLOUD_ENABLED) {
            self.cloud_enabled = parse_flag(&raw);
        }
        if let Some(secs) = lookup(env::PROCEDURE_TIMEOUT_SECONDS).and_then(|raw| raw.trim().parse().ok()) {
            self.procedure_timeout_secs = secs;
        }
        if let Some(secs) = lookup(env::REPLAY_WINDOW_SECONDS).and_then(|raw| raw.trim().parse().ok()) {
            self.replay_window_secs = secs;
        }

        let non_empty = |key| lookup(key).filter(|v: &String| !v.trim().is_empty());
        if let Some(v) = non_empty(env::SLACK_SIGNING_SECRET) {
            self.slack_signing_secret = Some(v);
        }
        if let Some(v) = non_empty(env::DISCORD_PUBLIC_KEY) {
            self.discord_public_key = Some(v);
        }
        if let Some(v) = non_empty(env::SLACK_WEBHOOK_URL) {
            self.slack_webhook_url = Some(v);
        }
        if let Some(v) = non_empty(env::DISCORD_WEBHOOK_URL) {
            self.discord_webhook_url = Some(v);
        }
        self
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.procedure_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "procedure_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        for (field, value) in [
            ("slack_webhook_url", &self.slack_webhook_url),
            ("discord_webhook_url", &self.discord_webhook_url),
        ] {
            if let Some(raw) = value {
                url::Url::parse(raw).map_err(|e| ConfigError::Invalid {
                    field,
                    reason: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn with_idempotency_ttl_secs(mut self, secs: u64) -> Self {
        self.idempotency_ttl_secs = secs;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_durable(mut self, enabled: bool) -> Self {
        self.use_durable = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_execution_enabled(mut self, enabled: bool) -> Self {
        self.execution_enabled = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cloud_enabled(mut self, enabled: bool) -> Self {
        self.cloud_enabled = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_procedure_timeout_secs(mut self, secs: u64) -> Self {
        self.procedure_timeout_secs = secs;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_slack_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.slack_signing_secret = Some(secret.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_discord_public_key(mut self, key_hex: impl Into<String>) -> Self {
        self.discord_public_key = Some(key_hex.into());
        self
    }

    /// Idempotency window
    #[inline]
    #[must_use]
    pub fn idempotency_ttl(&self) -> Duration {
        Duration::from_secs(self.idempotency_ttl_secs)
    }

    /// Per-procedure timeout
    #[inline]
    #[must_use]
    pub fn procedure_timeout(&self) -> Duration {
        Duration::from_secs(self.procedure_timeout_secs)
    }

    /// Slack verifier; rejects everything when no secret is configured
    #[must_use]
    pub fn slack_verifier(&self) -> SlackSignatureVerifier {
        SlackSignatureVerifier::new(self.slack_signing_secret.clone().unwrap_or_default())
            .with_window(ReplayWindow::new(self.replay_window_secs))
    }

    /// Discord verifier; rejects everything when no key is configured
    #[must_use]
    pub fn discord_verifier(&self) -> DiscordSignatureVerifier {
        DiscordSignatureVerifier::new(self.discord_public_key.clone().unwrap_or_default())
            .with_window(ReplayWindow::new(self.replay_window_secs))
    }
}

impl Default for SpikehoundConfig {
    fn default() -> Self {
        Self {
            idempotency_ttl_secs: 600,
            use_durable: false,
            execution_enabled: false,
            cloud_enabled: false,
            procedure_timeout_secs: 20,
            replay_window_secs: spikehound_security::DEFAULT_MAX_AGE_SECS,
            slack_signing_secret: None,
            discord_public_key: None,
            slack_webhook_url: None,
            discord_webhook_url: None,
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for SpikehoundConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpikehoundConfig")
            .field("idempotency_ttl_secs", &self.idempotency_ttl_secs)
            .field("use_durable", &self.use_durable)
            .field("execution_enabled", &self.execution_enabled)
            .field("cloud_enabled", &self.cloud_enabled)
            .field("procedure_timeout_secs", &self.procedure_timeout_secs)
            .field("replay_window_secs", &self.replay_window_secs)
            .field("slack_signing_secret", &self.slack_signing_secret.as_ref().map(|_| "<redacted>"))
            .field("discord_public_key", &self.discord_public_key)
            .field("slack_webhook_url", &self.slack_webhook_url.as_ref().map(|_| "<redacted>"))
            .field("discord_webhook_url", &self.discord_webhook_url.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = SpikehoundConfig::default();
        assert_eq!(config.idempotency_ttl_secs, 600);
        assert!(!config.use_durable);
        assert!(!config.execution_enabled);
        assert!(!config.cloud_enabled);
        assert_eq!(config.procedure_timeout(), Duration::from_secs(20));
        assert_eq!(config.replay_window_secs, 300);
    }

    #[test]
    fn lookup_rejects_zero_timeout() {
        let err = SpikehoundConfig::from_lookup(lookup(&[(env::PROCEDURE_TIMEOUT_SECONDS, "0")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "procedure_timeout_secs",
                ..
            }
        ));

        let err = SpikehoundConfig::from_lookup(lookup(&[(env::SLACK_WEBHOOK_URL, "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "slack_webhook_url", .. }));

        let config =
            SpikehoundConfig::from_lookup(lookup(&[(env::PROCEDURE_TIMEOUT_SECONDS, "3")])).unwrap();
        assert_eq!(config.procedure_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn env_overlay() {
        let config = SpikehoundConfig::default().overlay(lookup(&[
            (env::IDEMPOTENCY_TTL_SECONDS, "-30"),
            (env::USE_DURABLE, "TRUE"),
            (env::ENABLE_REMEDIATION_EXECUTION, "yes"),
            (env::CLOUD_ENABLED, " true "),
            (env::PROCEDURE_TIMEOUT_SECONDS, "nope"),
            (env::SLACK_SIGNING_SECRET, "  "),
        ]));

        assert_eq!(config.idempotency_ttl_secs, 0);
        assert!(config.use_durable);
        assert!(!config.execution_enabled);
        assert!(config.cloud_enabled);
        assert_eq!(config.procedure_timeout_secs, 20);
        assert!(config.slack_signing_secret.is_none());
    }

    #[test]
    fn toml_then_env() {
        let base = SpikehoundConfig::from_toml_str(
            "idempotency_ttl_secs = 60\nexecution_enabled = true\n",
        )
        .unwrap();
        assert_eq!(base.idempotency_ttl_secs, 60);
        assert!(base.execution_enabled);
        assert_eq!(base.procedure_timeout_secs, 20);

        let config = base.overlay(lookup(&[(env::ENABLE_REMEDIATION_EXECUTION, "false")]));
        assert!(!config.execution_enabled);
    }

    #[test]
    fn validate_rejects_zero_timeout_and_bad_urls() {
        assert!(SpikehoundConfig::default().with_procedure_timeout_secs(0).validate().is_err());

        let mut config = SpikehoundConfig::default();
        config.slack_webhook_url = Some("not a url".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "slack_webhook_url", .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = SpikehoundConfig::default().with_slack_signing_secret("hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
