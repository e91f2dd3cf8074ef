//! Configuration sections

use crate::constants::{
    APP_DIR, DEFAULT_ALLOWED_COMMANDS, DEFAULT_ENV_PASSTHROUGH, FALLBACK_CACHE_ROOT,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
        }
    }
}

/// Package cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root; platform cache dir when unset
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
    #[serde(default = "default_max_cache_size")]
    pub max_size_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_age_days: default_max_age_days(),
            max_size_bytes: default_max_cache_size(),
        }
    }
}

impl CacheConfig {
    /// Resolved cache root
    #[must_use]
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::cache_dir().map_or_else(
                || PathBuf::from(FALLBACK_CACHE_ROOT),
                |dir| dir.join(APP_DIR).join("packages"),
            )
        })
    }

    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days.saturating_mul(24 * 60 * 60))
    }
}

/// Verification thresholds and reputation additions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Packages scoring below this are blocked
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    #[serde(default = "default_max_package_size")]
    pub max_package_size: u64,
    /// Extra popular names checked for typosquatting
    #[serde(default)]
    pub popular_packages: Vec<String>,
    /// Extra denylisted package names
    #[serde(default)]
    pub malicious_packages: Vec<String>,
    /// Extra scopes that bypass typosquat checks
    #[serde(default)]
    pub trusted_scopes: Vec<String>,
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_package_size: default_max_package_size(),
            popular_packages: Vec::new(),
            malicious_packages: Vec::new(),
            trusted_scopes: Vec::new(),
            allowed_commands: default_allowed_commands(),
        }
    }
}

/// Limits applied to every child process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_exec_timeout")]
    pub timeout_secs: u64,
    /// Delay between SIGTERM and SIGKILL
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default = "default_cpu_seconds")]
    pub cpu_seconds: u64,
    #[serde(default = "default_memory_bytes")]
    pub memory_bytes: u64,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_max_open_files")]
    pub max_open_files: u64,
    #[serde(default = "default_env_passthrough")]
    pub env_passthrough: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_exec_timeout(),
            kill_grace_ms: default_kill_grace_ms(),
            max_output_bytes: default_max_output_bytes(),
            cpu_seconds: default_cpu_seconds(),
            memory_bytes: default_memory_bytes(),
            max_file_size_bytes: default_max_file_size(),
            max_open_files: default_max_open_files(),
            env_passthrough: default_env_passthrough(),
        }
    }
}

impl SandboxConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// Backoff policy for recoverable failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Budget for a whole install-and-run request
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_registry_timeout")]
    pub registry_timeout_secs: u64,
    /// Budget for the package manager step alone
    #[serde(default = "default_install_step_timeout")]
    pub install_timeout_secs: u64,
    #[serde(default = "default_min_tools")]
    pub min_tools_for_healthy: usize,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_request_timeout(),
            registry_timeout_secs: default_registry_timeout(),
            install_timeout_secs: default_install_step_timeout(),
            min_tools_for_healthy: default_min_tools(),
        }
    }
}

impl InstallConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    #[must_use]
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }
}

// Default value functions for serde
fn default_log_filter() -> String {
    "info".to_string()
}

fn default_max_age_days() -> u64 {
    30
}

fn default_max_cache_size() -> u64 {
    2 * 1024 * 1024 * 1024 // 2 GiB
}

fn default_min_score() -> u8 {
    50
}

fn default_max_package_size() -> u64 {
    50 * 1024 * 1024
}

fn default_allowed_commands() -> Vec<String> {
    DEFAULT_ALLOWED_COMMANDS
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_exec_timeout() -> u64 {
    60
}

fn default_kill_grace_ms() -> u64 {
    1000
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

fn default_cpu_seconds() -> u64 {
    300
}

fn default_memory_bytes() -> u64 {
    16 * 1024 * 1024 * 1024 // address space; JS engines reserve large regions
}

fn default_max_file_size() -> u64 {
    512 * 1024 * 1024
}

fn default_max_open_files() -> u64 {
    1024
}

fn default_env_passthrough() -> Vec<String> {
    DEFAULT_ENV_PASSTHROUGH
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.1
}

fn default_max_concurrency() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    600
}

fn default_registry_timeout() -> u64 {
    30
}

fn default_install_step_timeout() -> u64 {
    300
}

fn default_min_tools() -> usize {
    1
}
