//! Minimal configuration loading for whorl.
//!
//! Configuration is infrastructure-only: bind addresses, session
//! timing windows, and log level. Nothing here changes at runtime.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/whorl/config.toml` (system)
//! 2. `~/.config/whorl/config.toml` (user)
//! 3. `./whorl.toml` (local override)
//! 4. Environment variables (`WHORL_*`)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! http_port = 8091
//!
//! [session]
//! max_lifetime_secs = 1800
//! inactivity_timeout_secs = 600
//! watchdog_interval_secs = 60
//! grace_period_secs = 30
//! teardown_delay_secs = 2
//!
//! [telemetry]
//! log_level = "info"
//! ```

mod loader;

pub use loader::discover_config_files_with_override;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Network bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindConfig {
    /// Address to bind the HTTP/WebSocket server on.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_http_host")]
    pub http_host: String,

    /// HTTP port for the enrollment channel and status endpoints.
    /// Default: 8091
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_http_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        8091
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            http_host: Self::default_http_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Session timing windows.
///
/// The watchdog interval must be coarser than neither timeout; the
/// defaults (60s poll against 30min/10min windows) keep expiry soft
/// but bounded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute session lifetime in seconds. Default: 1800 (30 min)
    #[serde(default = "SessionConfig::default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,

    /// Inactivity timeout in seconds. Default: 600 (10 min)
    #[serde(default = "SessionConfig::default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,

    /// Expiration watchdog poll interval in seconds. Default: 60
    #[serde(default = "SessionConfig::default_watchdog_interval_secs")]
    pub watchdog_interval_secs: u64,

    /// Reconnect grace window after a disconnect, in seconds.
    /// Default: 30
    #[serde(default = "SessionConfig::default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Delay before a terminal session is torn down, giving a slow
    /// client time to receive the final event. Default: 2
    #[serde(default = "SessionConfig::default_teardown_delay_secs")]
    pub teardown_delay_secs: u64,
}

impl SessionConfig {
    fn default_max_lifetime_secs() -> u64 {
        1800
    }

    fn default_inactivity_timeout_secs() -> u64 {
        600
    }

    fn default_watchdog_interval_secs() -> u64 {
        60
    }

    fn default_grace_period_secs() -> u64 {
        30
    }

    fn default_teardown_delay_secs() -> u64 {
        2
    }

    /// Sanity-check the timing windows against each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lifetime_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "session.max_lifetime_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.inactivity_timeout_secs > self.max_lifetime_secs {
            return Err(ConfigError::InvalidValue {
                key: "session.inactivity_timeout_secs".to_string(),
                message: format!(
                    "inactivity window ({}) exceeds absolute lifetime ({})",
                    self.inactivity_timeout_secs, self.max_lifetime_secs
                ),
            });
        }
        if self.watchdog_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "session.watchdog_interval_secs".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_lifetime_secs: Self::default_max_lifetime_secs(),
            inactivity_timeout_secs: Self::default_inactivity_timeout_secs(),
            watchdog_interval_secs: Self::default_watchdog_interval_secs(),
            grace_period_secs: Self::default_grace_period_secs(),
            teardown_delay_secs: Self::default_teardown_delay_secs(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error). Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Top-level whorl configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhorlConfig {
    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl WhorlConfig {
    /// Load configuration from the standard file locations plus the
    /// `WHORL_*` environment overlay.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_override(None)
    }

    /// Load configuration, optionally replacing the local override
    /// file with an explicit path (CLI `--config`).
    pub fn load_with_override(
        cli_path: Option<&std::path::Path>,
    ) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for path in loader::discover_config_files_with_override(cli_path) {
            loader::merge_tables(&mut merged, loader::read_table(&path)?);
        }
        let mut config: WhorlConfig =
            toml::Value::Table(merged)
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::Parse {
                    path: PathBuf::from("layered config"),
                    message: e.to_string(),
                })?;
        loader::apply_env_overrides(&mut config)?;
        config.session.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WhorlConfig::default();
        assert_eq!(config.bind.http_port, 8091);
        assert_eq!(config.session.max_lifetime_secs, 1800);
        assert_eq!(config.session.inactivity_timeout_secs, 600);
        assert_eq!(config.session.watchdog_interval_secs, 60);
        assert_eq!(config.session.grace_period_secs, 30);
        assert_eq!(config.session.teardown_delay_secs, 2);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_validate_rejects_inverted_windows() {
        let session = SessionConfig {
            max_lifetime_secs: 60,
            inactivity_timeout_secs: 120,
            ..SessionConfig::default()
        };
        assert!(session.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_lifetime() {
        let session = SessionConfig {
            max_lifetime_secs: 0,
            ..SessionConfig::default()
        };
        assert!(session.validate().is_err());
    }
}
