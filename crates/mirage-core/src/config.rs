//! Configuration parsing and validation.
//!
//! The daemon is configured by a TOML file with three sections:
//!
//! ```toml
//! [listener]
//! bind_addr = "0.0.0.0:2222"
//! max_connections = 100
//!
//! [store]
//! db_path = "mirage_sessions.db"
//!
//! [responder]
//! endpoint = "https://api.example.com/v1/chat/completions"
//! model = "decoy-shell-v1"
//! api_key_env = "MIRAGE_API_KEY"
//!
//! [responder.retry]
//! max_attempts = 3
//! base_delay = "500ms"
//! multiplier = 2.0
//! max_delay = "30s"
//! ```
//!
//! Every field has a default; an empty file (or a missing file, at the
//! caller's discretion) yields a fully working local-only honeypot.
//! The `[responder]` section is optional: its absence is the normal
//! local-only mode, not an error. Validation is fail-closed — a config
//! that parses but cannot work (unparseable bind address, zero
//! connection ceiling, blank endpoint) is rejected at load time rather
//! than at first use.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryPolicy;

/// Top-level daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoneypotConfig {
    /// TCP listener settings.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Session persistence settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Generative responder settings. `None` means local-only mode.
    #[serde(default)]
    pub responder: Option<ResponderConfig>,
}

/// TCP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Address to bind, `host:port`.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Concurrent session ceiling. Connections beyond it queue for a
    /// permit before they are accepted.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_bind_addr() -> String {
    // Non-privileged decoy port.
    "0.0.0.0:2222".to_string()
}

const fn default_max_connections() -> usize {
    100
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_connections: default_max_connections(),
        }
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mirage_sessions.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Generative responder settings.
///
/// The credential itself never appears in the file; `api_key_env`
/// names the environment variable it is read from at startup. A
/// missing variable downgrades the daemon to local-only mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    /// Chat-completion endpoint URL.
    pub endpoint: String,

    /// Model identifier sent with each request.
    pub model: String,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Retry/backoff policy for backend calls.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_api_key_env() -> String {
    "MIRAGE_API_KEY".to_string()
}

impl HoneypotConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address is not `host:port`.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listener.bind_addr.parse().map_err(|e| {
            ConfigError::Validation(format!(
                "listener.bind_addr '{}' is not a valid socket address: {e}",
                self.listener.bind_addr
            ))
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;

        if self.listener.max_connections == 0 {
            return Err(ConfigError::Validation(
                "listener.max_connections must be at least 1".to_string(),
            ));
        }

        if let Some(responder) = &self.responder {
            if responder.endpoint.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "responder.endpoint must not be empty".to_string(),
                ));
            }
            if !responder.endpoint.starts_with("http://")
                && !responder.endpoint.starts_with("https://")
            {
                return Err(ConfigError::Validation(format!(
                    "responder.endpoint '{}' must be an http(s) URL",
                    responder.endpoint
                )));
            }
            if responder.model.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "responder.model must not be empty".to_string(),
                ));
            }
            if responder.retry.max_attempts == 0 {
                return Err(ConfigError::Validation(
                    "responder.retry.max_attempts must be at least 1".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed config is not usable.
    #[error("invalid config: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_empty_config_yields_local_only_defaults() {
        let config = HoneypotConfig::from_toml("").unwrap();
        assert_eq!(config.listener.bind_addr, "0.0.0.0:2222");
        assert_eq!(config.listener.max_connections, 100);
        assert_eq!(config.store.db_path, PathBuf::from("mirage_sessions.db"));
        assert!(config.responder.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let config = HoneypotConfig::from_toml(
            r#"
            [listener]
            bind_addr = "127.0.0.1:2223"
            max_connections = 10

            [store]
            db_path = "/var/lib/mirage/sessions.db"

            [responder]
            endpoint = "https://api.example.com/v1/chat/completions"
            model = "decoy-shell-v1"
            api_key_env = "DECOY_KEY"

            [responder.retry]
            max_attempts = 4
            base_delay = "1s"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.max_connections, 10);
        let responder = config.responder.unwrap();
        assert_eq!(responder.api_key_env, "DECOY_KEY");
        assert_eq!(responder.retry.max_attempts, 4);
        assert_eq!(responder.retry.base_delay, Duration::from_secs(1));
        // Unspecified retry fields keep their defaults.
        assert_eq!(responder.retry.multiplier, 2.0);
    }

    #[test]
    fn test_invalid_bind_addr_rejected() {
        let err = HoneypotConfig::from_toml(
            r#"
            [listener]
            bind_addr = "not-an-address"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_connection_ceiling_rejected() {
        let err = HoneypotConfig::from_toml(
            r#"
            [listener]
            max_connections = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_responder_requires_http_endpoint() {
        let err = HoneypotConfig::from_toml(
            r#"
            [responder]
            endpoint = "ftp://example.com"
            model = "m"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_responder_requires_model() {
        let err = HoneypotConfig::from_toml(
            r#"
            [responder]
            endpoint = "https://example.com/v1"
            model = ""
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_from_file_missing_is_io_error() {
        let err = HoneypotConfig::from_file(Path::new("/nonexistent/mirage.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
