//! Configuration management
//!
//! This module handles loading and managing tool configuration from:
//! - Command-line arguments
//! - Configuration files (TOML)
//! - Defaults
//!
//! Deployment settings (service, stage, region, function mapping) live in the
//! service manifest instead, see [`crate::manifest`].

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub emulator: EmulatorConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// How to run and reach the Step Functions emulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Program to launch. When unset, an already running emulator is used.
    pub command: Option<String>,

    /// Extra arguments passed before the generated ones
    #[serde(default)]
    pub args: Vec<String>,

    /// Endpoint the emulator proxies Task invocations to
    #[serde(default = "default_lambda_endpoint")]
    pub lambda_endpoint: String,

    /// Timeout for a single control API request
    #[serde(default = "default_request_timeout", with = "humane_duration")]
    pub request_timeout: Duration,
}

/// Health probe policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Maximum number of probe attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between attempts
    #[serde(default = "default_retry_delay", with = "humane_duration")]
    pub retry_delay: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Where registered ARNs are published besides the log
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// dotenv-style file receiving `OFFLINE_STEP_FUNCTIONS_ARN_*` lines
    pub env_file: Option<PathBuf>,
}

/// Durations written as `"500ms"` / `"2s"`, or as whole seconds
mod humane_duration {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => humantime::parse_duration(&text).map_err(de::Error::custom),
        }
    }
}

// Default value functions

fn default_lambda_endpoint() -> String {
    "http://localhost:3002".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            lambda_endpoint: default_lambda_endpoint(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./offline-step-functions.toml
    /// 2. ~/.offline-step-functions/config.toml
    /// 3. /etc/offline-step-functions/config.toml
    pub fn load() -> Result<Self> {
        let paths = vec![
            PathBuf::from("offline-step-functions.toml"),
            dirs::home_dir()
                .map(|h| h.join(".offline-step-functions").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("/dev/null")),
            PathBuf::from("/etc/offline-step-functions/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                tracing::info!("Loading config from {:?}", path);
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }
}
