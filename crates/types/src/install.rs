//! Install requests and outcomes

use e14z_errors::{ClassifiedError, ErrorCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One alternative way to install a package, as listed by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationMethod {
    #[serde(rename = "type")]
    pub method_type: String,
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<u32>,
}

/// What the registry knows about installing a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallSpec {
    pub name: String,
    pub install_command: String,
    pub install_type: String,
    #[serde(default)]
    pub installation_methods: Vec<InstallationMethod>,
}

impl InstallSpec {
    /// Pick the command to run, honouring a preferred method type if given
    ///
    /// Returns `None` when a preferred method was requested but not listed.
    #[must_use]
    pub fn select_command(&self, preferred: Option<&str>) -> Option<&str> {
        match preferred {
            Some(wanted) => self
                .installation_methods
                .iter()
                .filter(|m| m.method_type.eq_ignore_ascii_case(wanted))
                .min_by_key(|m| m.priority.unwrap_or(u32::MAX))
                .map(|m| m.command.as_str())
                .or_else(|| {
                    self.install_type
                        .eq_ignore_ascii_case(wanted)
                        .then_some(self.install_command.as_str())
                }),
            None => Some(self.install_command.as_str()),
        }
    }
}

/// Caller-supplied knobs for one install-and-run request
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Overall budget for the request; falls back to configuration
    pub timeout: Option<Duration>,
    /// Installation method type to prefer (`npm`, `pipx`, `docker`, ...)
    pub preferred_method: Option<String>,
    /// Extra environment passed to the package process
    pub env: BTreeMap<String, String>,
}

impl InstallOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.preferred_method = Some(method.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// States of the install-and-run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallPhase {
    Fetching,
    Verifying,
    CacheHit,
    Installing,
    Executing,
    Success,
    Failed,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetching => "fetching",
            Self::Verifying => "verifying",
            Self::CacheHit => "cache_hit",
            Self::Installing => "installing",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Health tier of a package after execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Healthy,
    Degraded,
    Failed,
}

/// A tool advertised by an MCP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Parameter names from the tool's input schema
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Diagnostics about how the package was run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetails {
    pub command: String,
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub cache_hit: bool,
    pub attempts: u32,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub resources_count: usize,
    pub prompts_count: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr_tail: String,
}

/// Result of `install_and_run`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_details: Option<ExecutionDetails>,
    pub health: HealthTier,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_env_vars: Vec<String>,
    /// Last state the request reached
    pub phase: InstallPhase,
}

impl InstallOutcome {
    /// Successful run
    #[must_use]
    pub fn succeeded(
        tools: Vec<ToolInfo>,
        cache_dir: PathBuf,
        details: ExecutionDetails,
        health: HealthTier,
    ) -> Self {
        Self {
            success: true,
            error: None,
            category: None,
            suggestions: Vec::new(),
            tools: Some(tools),
            cache_dir: Some(cache_dir),
            execution_details: Some(details),
            health,
            auth_env_vars: Vec::new(),
            phase: InstallPhase::Success,
        }
    }

    /// Failed run; always carries a classification
    #[must_use]
    pub fn failed(classified: &ClassifiedError) -> Self {
        Self {
            success: false,
            error: Some(classified.message().to_string()),
            category: Some(classified.category()),
            suggestions: classified.suggestions().to_vec(),
            tools: None,
            cache_dir: None,
            execution_details: None,
            health: HealthTier::Failed,
            auth_env_vars: Vec::new(),
            phase: InstallPhase::Failed,
        }
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: ExecutionDetails) -> Self {
        self.execution_details = Some(details);
        self
    }

    /// Mark as installed-but-unusable because credentials are missing
    #[must_use]
    pub fn degraded_by_auth(mut self, vars: Vec<String>) -> Self {
        self.health = HealthTier::Degraded;
        self.suggestions.insert(
            0,
            format!("Set the required environment variables: {}", vars.join(", ")),
        );
        self.auth_env_vars = vars;
        self
    }
}
