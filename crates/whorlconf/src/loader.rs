//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, WhorlConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local/cli). Only
/// returns files that exist. A CLI override path replaces the local
/// override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    // System config
    let system = PathBuf::from("/etc/whorl/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("whorl/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    // CLI override takes precedence over local
    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    // Local override (current directory)
    let local = PathBuf::from("whorl.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Parse one config file into a raw TOML table for layering.
pub fn read_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Overlay `overlay` onto `base`, key by key. Nested tables merge
/// recursively, so a local file that only sets one `[session]` key
/// leaves the `[bind]` section from an earlier file intact.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Apply `WHORL_*` environment variable overrides.
///
/// Supported: WHORL_HTTP_HOST, WHORL_HTTP_PORT, WHORL_LOG_LEVEL,
/// WHORL_MAX_LIFETIME_SECS, WHORL_INACTIVITY_TIMEOUT_SECS,
/// WHORL_WATCHDOG_INTERVAL_SECS, WHORL_GRACE_PERIOD_SECS,
/// WHORL_TEARDOWN_DELAY_SECS.
pub fn apply_env_overrides(config: &mut WhorlConfig) -> Result<(), ConfigError> {
    if let Ok(v) = env::var("WHORL_HTTP_HOST") {
        config.bind.http_host = v;
    }
    if let Ok(v) = env::var("WHORL_HTTP_PORT") {
        config.bind.http_port = parse_env("WHORL_HTTP_PORT", &v)?;
    }
    if let Ok(v) = env::var("WHORL_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    if let Ok(v) = env::var("WHORL_MAX_LIFETIME_SECS") {
        config.session.max_lifetime_secs = parse_env("WHORL_MAX_LIFETIME_SECS", &v)?;
    }
    if let Ok(v) = env::var("WHORL_INACTIVITY_TIMEOUT_SECS") {
        config.session.inactivity_timeout_secs = parse_env("WHORL_INACTIVITY_TIMEOUT_SECS", &v)?;
    }
    if let Ok(v) = env::var("WHORL_WATCHDOG_INTERVAL_SECS") {
        config.session.watchdog_interval_secs = parse_env("WHORL_WATCHDOG_INTERVAL_SECS", &v)?;
    }
    if let Ok(v) = env::var("WHORL_GRACE_PERIOD_SECS") {
        config.session.grace_period_secs = parse_env("WHORL_GRACE_PERIOD_SECS", &v)?;
    }
    if let Ok(v) = env::var("WHORL_TEARDOWN_DELAY_SECS") {
        config.session.teardown_delay_secs = parse_env("WHORL_TEARDOWN_DELAY_SECS", &v)?;
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{value:?}: {e}"),
    })
}
