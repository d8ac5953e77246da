//! Layered settings for crawlbox
//!
//! Struct defaults come first, then `config/crawlbox.toml` (or the file named
//! by `CRAWLBOX_CONFIG`), then `.env` and process environment variables.
//!
//! ```no_run
//! use crawlbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Fetcher concurrency: {}", config.worker.concurrency);
//! ```
//!
//! Environment keys use `CRAWLBOX__<section>__<key>`, for example
//! `CRAWLBOX__WORKER__CONCURRENCY=32` or `CRAWLBOX__QUEUE__REQUEUE_DELAY=10s`.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    CacheConfig, Config, HttpSettings, LogFormat, QueueConfig, ServerConfig, StoreConfig,
    TelemetryConfig, WorkerConfig,
};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[worker]\nconcurrency = 2\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.worker.concurrency, 2);
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[worker]\nconcurrency = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroConcurrency)
        ));
    }

    #[test]
    fn test_full_config_example() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "0.0.0.0:8080"

[queue]
path = "data/queue"
topic = "fetch"
requeue_delay = "5s"
max_requeue_delay = "15m"

[store]
path = "data/store"

[cache]
enabled = true
dir = "cache"

[worker]
concurrency = 16
drain_timeout = "30s"

[http]
base_url = "https://na.finalfantasyxiv.com/lodestone/"
connect_timeout = "10s"
request_timeout = "1m"

[telemetry]
log_format = "json"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.worker.concurrency, 16);
        assert_eq!(config.queue.max_requeue_delay.to_string(), "15m");
        assert_eq!(config.http.request_timeout.to_string(), "1m");
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
    }
}
