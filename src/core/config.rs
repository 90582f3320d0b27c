use crate::core::errors::ConfigError;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Default remote segmentation endpoint
pub const DEFAULT_ENDPOINT: &str = "https://sdk.photoroom.com/v1/segment";

/// Default file the API key is persisted to, relative to the working directory
pub const DEFAULT_KEY_PATH: &str = "photoroom_api_key.txt";

/// API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub key_path: PathBuf,
}

/// Compositing configuration
#[derive(Debug, Clone)]
pub struct CompositeConfig {
    /// Default vertical space reserved below the source image (signed px)
    pub bottom_reserve: i32,
}

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How often the controller drains the event channel
    pub poll_interval_ms: u64,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub composite: CompositeConfig,
    pub controller: ControllerConfig,
    pub log_level: Level,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        // Parse log level
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Self {
            api: ApiConfig {
                endpoint: env::var("PHOTOROOM_ENDPOINT")
                    .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
                timeout_secs: env::var("API_TIMEOUT_SECONDS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
                key_path: env::var("API_KEY_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_KEY_PATH)),
            },
            composite: CompositeConfig {
                bottom_reserve: env::var("BOTTOM_RESERVE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(-100),
            },
            controller: ControllerConfig {
                poll_interval_ms: env::var("POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(200),
            },
            log_level,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.api.endpoint.starts_with("http://") && !self.api.endpoint.starts_with("https://") {
            return Err(ConfigError::InvalidEndpoint(self.api.endpoint.clone()));
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(self.api.timeout_secs));
        }

        if self.controller.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(
                self.controller.poll_interval_ms,
            ));
        }

        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        &self.api.endpoint
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn key_path(&self) -> &Path {
        &self.api.key_path
    }

    pub fn bottom_reserve(&self) -> i32 {
        self.composite.bottom_reserve
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.controller.poll_interval_ms)
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }
}
