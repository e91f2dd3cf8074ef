//! Parsed package descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version placeholder used when an install command does not pin one
pub const LATEST: &str = "latest";

/// Package registry kinds an install command can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    Npm,
    Pypi,
    Git,
    Docker,
}

impl Registry {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pypi => "pypi",
            Self::Git => "git",
            Self::Docker => "docker",
        }
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured representation of an install command
///
/// Produced by exactly one parser per registry kind. `name` never contains
/// the npm scope; use [`PackageDescriptor::full_name`] for the addressable
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub registry: Registry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Arguments that followed the package in the original command
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
}

impl PackageDescriptor {
    /// Create a descriptor with no scope, repository or branch
    pub fn new(registry: Registry, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            scope: None,
            registry,
            repository_url: None,
            branch: None,
            extra_args: Vec::new(),
        }
    }

    /// Name including the npm scope (`@scope/name`) when present
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{scope}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Whether the command left the version unpinned
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }

    /// Key used to address the package in the cache
    #[must_use]
    pub fn cache_key(&self) -> (String, String) {
        (self.full_name(), self.version.clone())
    }
}

impl fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.registry, self.full_name(), self.version)
    }
}
