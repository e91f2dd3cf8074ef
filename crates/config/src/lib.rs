#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for e14z
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/e14z/config.toml)
//! - Environment variables
//! - CLI flags
//!
//! The resulting [`Config`] is immutable once handed to the installer.

pub mod constants;
pub mod sections;

pub use sections::{
    CacheConfig, GeneralConfig, InstallConfig, RetryConfig, SandboxConfig, SecurityConfig,
};

use constants::{
    APP_DIR, CONFIG_FILE, ENV_CACHE_DIR, ENV_LOG, ENV_MAX_CONCURRENCY, ENV_MAX_RETRIES,
    ENV_TIMEOUT,
};
use e14z_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub install: InstallConfig,
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or contains unknown value types.
    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(dir) = std::env::var(ENV_CACHE_DIR) {
            if dir.is_empty() {
                return Err(invalid(ENV_CACHE_DIR, dir));
            }
            self.cache.root = Some(PathBuf::from(dir));
        }

        if let Some(timeout) = parse_env::<u64>(ENV_TIMEOUT)? {
            self.install.timeout_secs = timeout;
        }

        if let Some(concurrency) = parse_env::<usize>(ENV_MAX_CONCURRENCY)? {
            self.install.max_concurrency = concurrency;
        }

        if let Some(retries) = parse_env::<u32>(ENV_MAX_RETRIES)? {
            self.retry.max_retries = retries;
        }

        if let Ok(filter) = std::env::var(ENV_LOG) {
            self.general.log_filter = filter;
        }

        Ok(())
    }

    /// Reject values that would make the installer unusable
    ///
    /// # Errors
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), Error> {
        if self.install.max_concurrency == 0 {
            return Err(invalid("install.max_concurrency", "0"));
        }
        if self.install.timeout_secs == 0 {
            return Err(invalid("install.timeout_secs", "0"));
        }
        if self.retry.max_retries == 0 {
            return Err(invalid("retry.max_retries", "0"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(invalid(
                "retry.backoff_multiplier",
                self.retry.backoff_multiplier.to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(invalid(
                "retry.jitter_factor",
                self.retry.jitter_factor.to_string(),
            ));
        }
        if self.security.min_score > 100 {
            return Err(invalid(
                "security.min_score",
                self.security.min_score.to_string(),
            ));
        }
        if self.sandbox.max_output_bytes == 0 {
            return Err(invalid("sandbox.max_output_bytes", "0"));
        }
        if self.security.allowed_commands.is_empty() {
            return Err(ConfigError::Invalid {
                message: "security.allowed_commands must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map(Some).map_err(|_| invalid(name, raw)),
        Err(_) => Ok(None),
    }
}

fn invalid(field: &str, value: impl Into<String>) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.into(),
    }
    .into()
}
