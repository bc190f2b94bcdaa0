//! Configuration file parser for ~/.config/feedscout/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde and logged as a warning so typos are
//! visible.
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::discovery::{
    DiscoverySettings, DEFAULT_MAX_BODY_SIZE, DEFAULT_POOL_TIMEOUT, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SEARCH_ENDPOINT, DEFAULT_USER_AGENT, DEFAULT_WORKERS,
    MAX_SEARCH_CANDIDATES,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Struct
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTML search page queried for free-text phrases.
    pub search_endpoint: String,

    /// User-Agent sent with search requests.
    pub user_agent: String,

    /// Result links taken from one search page (at most 40).
    pub max_candidates: usize,

    /// Concurrent candidate fetches.
    pub workers: usize,

    /// Links buffered between the producer and the workers.
    pub queue_capacity: usize,

    /// Shared deadline for all candidates of one search, in seconds.
    pub pool_timeout_secs: u64,

    /// Per-request client timeout, in seconds.
    pub request_timeout_secs: u64,

    /// Largest response body accepted, in bytes.
    pub max_body_size: usize,

    /// Refuse loopback, private and link-local targets.
    pub block_private_addresses: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_candidates: MAX_SEARCH_CANDIDATES,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pool_timeout_secs: DEFAULT_POOL_TIMEOUT.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            block_private_addresses: true,
        }
    }
}

const KNOWN_KEYS: &[&str] = &[
    "search_endpoint",
    "user_agent",
    "max_candidates",
    "workers",
    "queue_capacity",
    "pool_timeout_secs",
    "request_timeout_secs",
    "max_body_size",
    "block_private_addresses",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            endpoint = %config.search_endpoint,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Converts into runtime discovery settings.
    ///
    /// Zero worker, queue and timeout values fall back to their defaults.
    pub fn discovery_settings(&self) -> DiscoverySettings {
        DiscoverySettings {
            search_endpoint: self.search_endpoint.clone(),
            user_agent: self.user_agent.clone(),
            max_candidates: self.max_candidates.min(MAX_SEARCH_CANDIDATES),
            workers: or_default("workers", self.workers, DEFAULT_WORKERS),
            queue_capacity: or_default("queue_capacity", self.queue_capacity, DEFAULT_QUEUE_CAPACITY),
            pool_timeout: Duration::from_secs(or_default(
                "pool_timeout_secs",
                self.pool_timeout_secs,
                DEFAULT_POOL_TIMEOUT.as_secs(),
            )),
            request_timeout: Duration::from_secs(or_default(
                "request_timeout_secs",
                self.request_timeout_secs,
                DEFAULT_REQUEST_TIMEOUT.as_secs(),
            )),
            max_body_size: or_default("max_body_size", self.max_body_size, DEFAULT_MAX_BODY_SIZE),
            block_private_addresses: self.block_private_addresses,
        }
    }
}

fn or_default<T>(key: &str, value: T, default: T) -> T
where
    T: PartialEq + Default + std::fmt::Display + Copy,
{
    if value == T::default() {
        tracing::warn!(key = %key, default = %default, "Zero value in config, using default");
        default
    } else {
        value
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_config(name: &str, content: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("feedscout_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.search_endpoint, "https://html.duckduckgo.com/html/");
        assert_eq!(config.max_candidates, 40);
        assert_eq!(config.workers, 10);
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.pool_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.max_body_size, 10 * 1024 * 1024);
        assert!(config.block_private_addresses);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedscout_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let path = write_config("empty", "");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        cleanup(&path);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let path = write_config("whitespace", "   \n  \n  ");
        assert_eq!(Config::load(&path).unwrap(), Config::default());
        cleanup(&path);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let path = write_config("partial", "workers = 4\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_capacity, 5); // default
        assert!(config.block_private_addresses); // default

        cleanup(&path);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
search_endpoint = "https://search.example.com/html/"
user_agent = "feedscout-test"
max_candidates = 20
workers = 3
queue_capacity = 2
pool_timeout_secs = 5
request_timeout_secs = 15
max_body_size = 4096
block_private_addresses = false
"#;
        let path = write_config("full", content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.search_endpoint, "https://search.example.com/html/");
        assert_eq!(config.user_agent, "feedscout-test");
        assert_eq!(config.max_candidates, 20);
        assert_eq!(config.workers, 3);
        assert_eq!(config.queue_capacity, 2);
        assert_eq!(config.pool_timeout_secs, 5);
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.max_body_size, 4096);
        assert!(!config.block_private_addresses);

        cleanup(&path);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let path = write_config("invalid", "this is not [valid toml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        cleanup(&path);
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let path = write_config("unknown", "workers = 2\ntotally_fake_key = \"x\"\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.workers, 2);

        cleanup(&path);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let path = write_config("wrongtype", "workers = \"many\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        cleanup(&path);
    }

    #[test]
    fn test_too_large_file_rejected() {
        let path = write_config("too_large", &"a".repeat(1_048_577));

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        cleanup(&path);
    }

    #[test]
    fn test_discovery_settings_from_defaults() {
        let settings = Config::default().discovery_settings();
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(settings.pool_timeout, Duration::from_secs(10));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_candidates, MAX_SEARCH_CANDIDATES);
        assert!(settings.block_private_addresses);
    }

    #[test]
    fn test_discovery_settings_replace_zero_values() {
        let config = Config {
            workers: 0,
            queue_capacity: 0,
            pool_timeout_secs: 0,
            request_timeout_secs: 0,
            max_body_size: 0,
            ..Config::default()
        };
        let settings = config.discovery_settings();
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(settings.pool_timeout, DEFAULT_POOL_TIMEOUT);
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(settings.max_body_size, DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn test_discovery_settings_clamp_candidates() {
        let config = Config {
            max_candidates: 400,
            ..Config::default()
        };
        assert_eq!(config.discovery_settings().max_candidates, 40);
    }
}
