//! Configuration loading for sync-client.
//!
//! Configuration is loaded from a TOML file (default: `watchlink.toml`).
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use watchlink_sync_core::{validate_scheme, ContextPolicy, DEFAULT_DEDUPE_CAPACITY};

/// Root configuration for a companion link.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Link behaviour.
    #[serde(default)]
    pub link: LinkSettings,
}

/// Link behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSettings {
    /// URL scheme the device picker calls back on (default: watchlink-ciq).
    #[serde(default = "default_callback_scheme")]
    pub callback_scheme: String,
    /// Persistent-context policy (default: clear-during-active).
    #[serde(default)]
    pub context_policy: ContextPolicy,
    /// Number of command ids remembered for dedupe (default: 256).
    #[serde(default = "default_dedupe_capacity")]
    pub dedupe_capacity: usize,
    /// How long a fast-path reconnect waits for a device status (default: 3000).
    #[serde(default = "default_status_timeout_ms")]
    pub status_timeout_ms: u64,
}

// Default value functions
fn default_callback_scheme() -> String {
    "watchlink-ciq".to_string()
}

fn default_dedupe_capacity() -> usize {
    DEFAULT_DEDUPE_CAPACITY
}

fn default_status_timeout_ms() -> u64 {
    3000
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            callback_scheme: default_callback_scheme(),
            context_policy: ContextPolicy::default(),
            dedupe_capacity: default_dedupe_capacity(),
            status_timeout_ms: default_status_timeout_ms(),
        }
    }
}

impl LinkConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot constrain.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_scheme(&self.link.callback_scheme)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.link.dedupe_capacity == 0 {
            return Err(ConfigError::Invalid(
                "dedupe_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Fast-path status timeout.
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.link.status_timeout_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LinkConfig::default();
        assert_eq!(config.link.callback_scheme, "watchlink-ciq");
        assert_eq!(config.link.dedupe_capacity, 256);
        assert_eq!(config.link.context_policy, ContextPolicy::ClearDuringActivePhases);
        assert_eq!(config.status_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: LinkConfig = toml::from_str("").unwrap();
        assert_eq!(config, LinkConfig::default());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[link]
callback_scheme = "myapp-ciq"
context_policy = "always-write"
dedupe_capacity = 64
"#;

        let config: LinkConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.link.callback_scheme, "myapp-ciq");
        assert_eq!(config.link.context_policy, ContextPolicy::AlwaysWriteState);
        assert_eq!(config.link.dedupe_capacity, 64);
        assert_eq!(config.link.status_timeout_ms, 3000);
    }

    #[test]
    fn unknown_policy_fails_to_parse() {
        let toml = "[link]\ncontext_policy = \"sometimes\"\n";
        assert!(toml::from_str::<LinkConfig>(toml).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = LinkConfig::default();
        config.link.callback_scheme = "bad scheme".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = LinkConfig::default();
        config.link.dedupe_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watchlink.toml");
        std::fs::write(&path, "[link]\nstatus_timeout_ms = 500\n").unwrap();

        let config = LinkConfig::from_file(&path).unwrap();
        assert_eq!(config.status_timeout(), Duration::from_millis(500));

        std::fs::write(&path, "[link]\ndedupe_capacity = 0\n").unwrap();
        assert!(matches!(
            LinkConfig::from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = LinkConfig::from_file(Path::new("/nonexistent/watchlink.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }
}
