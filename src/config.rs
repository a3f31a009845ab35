//! Application configuration management.
//!
//! Configuration is read from `~/.config/prefpop/config.json` when present.
//! Every field is optional. The API key itself is never stored here; it is
//! read once from the `RESAS_API_KEY` environment variable (a `.env` file
//! is honoured).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "prefpop";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable holding the RESAS API key
pub const API_KEY_ENV: &str = "RESAS_API_KEY";

pub const DEFAULT_API_ENDPOINT: &str = "https://opendata.resas-portal.go.jp/api/v1";

/// RESAS allows one request per second per key.
const DEFAULT_REQUEST_INTERVAL_MS: u64 = 1000;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub request_interval_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_json(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the log file
    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn api_endpoint(&self) -> &str {
        self.api_endpoint
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_API_ENDPOINT)
    }

    /// Minimum spacing between population fetches. Never below one second.
    pub fn request_interval(&self) -> Duration {
        let ms = self
            .request_interval_ms
            .unwrap_or(DEFAULT_REQUEST_INTERVAL_MS)
            .max(DEFAULT_REQUEST_INTERVAL_MS);
        Duration::from_millis(ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .filter(|&secs| secs > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

/// Read the API key from the environment, treating blank as unset.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_endpoint(), DEFAULT_API_ENDPOINT);
        assert_eq!(config.request_interval(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json() {
        let config = Config::from_json(r#"{"request_interval_ms": 1500}"#).unwrap();
        assert_eq!(config.request_interval(), Duration::from_millis(1500));
        assert_eq!(config.api_endpoint(), DEFAULT_API_ENDPOINT);

        let config = Config::from_json(r#"{"api_endpoint": "http://localhost:8080/api/v1", "request_timeout_secs": 0}"#).unwrap();
        assert_eq!(config.api_endpoint(), "http://localhost:8080/api/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_interval_never_below_rate_limit() {
        let config = Config::from_json(r#"{"request_interval_ms": 200}"#).unwrap();
        assert_eq!(config.request_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_blank_endpoint_falls_back() {
        let config = Config::from_json(r#"{"api_endpoint": "  "}"#).unwrap();
        assert_eq!(config.api_endpoint(), DEFAULT_API_ENDPOINT);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(Config::from_json("{not json").is_err());
    }
}
