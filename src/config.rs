//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TASKPULSE_CONFIG_PATH";

const DEFAULT_LEADERBOARD_TTL_SECS: u64 = 3_600;
const DEFAULT_ROOM_CAPACITY: usize = 16;
const DEFAULT_PAGE_LIMIT: u64 = 20;
const DEFAULT_MAX_PAGE_LIMIT: u64 = 100;
const DEFAULT_STAT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_STAT_RETRY_BACKOFF_MS: u64 = 50;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// How long a cached global leaderboard stays valid.
    pub leaderboard_ttl: Duration,
    /// Buffered events per room broadcast channel.
    pub room_capacity: usize,
    /// Page size used when the caller does not supply one.
    pub default_page_limit: u64,
    /// Upper bound on caller-supplied page sizes.
    pub max_page_limit: u64,
    /// Attempts made before a stat-aggregation failure is surfaced.
    pub stat_retry_attempts: u32,
    /// Backoff before the first stat-aggregation retry; doubles per attempt.
    pub stat_retry_backoff: Duration,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Default, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    leaderboard_ttl_secs: Option<u64>,
    room_capacity: Option<usize>,
    default_page_limit: Option<u64>,
    max_page_limit: Option<u64>,
    stat_retry_attempts: Option<u32>,
    stat_retry_backoff_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            leaderboard_ttl: Duration::from_secs(
                raw.leaderboard_ttl_secs
                    .unwrap_or(DEFAULT_LEADERBOARD_TTL_SECS),
            ),
            room_capacity: raw.room_capacity.unwrap_or(DEFAULT_ROOM_CAPACITY).max(1),
            default_page_limit: raw.default_page_limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1),
            max_page_limit: raw.max_page_limit.unwrap_or(DEFAULT_MAX_PAGE_LIMIT).max(1),
            stat_retry_attempts: raw
                .stat_retry_attempts
                .unwrap_or(DEFAULT_STAT_RETRY_ATTEMPTS)
                .max(1),
            stat_retry_backoff: Duration::from_millis(
                raw.stat_retry_backoff_ms
                    .unwrap_or(DEFAULT_STAT_RETRY_BACKOFF_MS),
            ),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.leaderboard_ttl, Duration::from_secs(3_600));
        assert!(config.default_page_limit <= config.max_page_limit);
        assert!(config.stat_retry_attempts >= 1);
    }

    #[test]
    fn partial_config_keeps_defaults_for_the_rest() {
        let raw: RawConfig = serde_json::from_str(r#"{"leaderboard_ttl_secs": 60}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.leaderboard_ttl, Duration::from_secs(60));
        assert_eq!(config.room_capacity, DEFAULT_ROOM_CAPACITY);
    }
}
