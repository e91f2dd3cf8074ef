//! Registry metadata attached to a package
//!
//! Each registry kind gets its own partially-optional struct. Fields this
//! crate does not model are preserved in `extra` rather than dropped, so the
//! verifier can still inspect them explicitly.

use crate::Registry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata published by npm for a package version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NpmMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    /// Unpacked size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub bin: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Metadata published by `PyPI`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PypiMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Console-script entry points (`name -> module:function`)
    #[serde(default)]
    pub entry_points: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Metadata for a git repository source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GitMetadata {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
    /// Scripts declared in the repository's package manifest, if any
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Metadata for a container image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerMetadata {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Registry metadata, tagged by registry kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "registry", rename_all = "lowercase")]
pub enum PackageMetadata {
    Npm(NpmMetadata),
    Pypi(PypiMetadata),
    Git(GitMetadata),
    Docker(DockerMetadata),
}

impl PackageMetadata {
    #[must_use]
    pub fn registry(&self) -> Registry {
        match self {
            Self::Npm(_) => Registry::Npm,
            Self::Pypi(_) => Registry::Pypi,
            Self::Git(_) => Registry::Git,
            Self::Docker(_) => Registry::Docker,
        }
    }

    /// Lifecycle scripts the package declares (empty for registries without them)
    #[must_use]
    pub fn scripts(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Npm(meta) => Some(&meta.scripts),
            Self::Git(meta) => Some(&meta.scripts),
            Self::Pypi(_) | Self::Docker(_) => None,
        }
    }

    /// Declared package size in bytes
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        match self {
            Self::Npm(meta) => meta.size,
            Self::Pypi(meta) => meta.size,
            Self::Git(meta) => meta.size,
            Self::Docker(meta) => meta.size,
        }
    }

    /// Fields not modelled by the typed struct
    #[must_use]
    pub fn extra(&self) -> &BTreeMap<String, Value> {
        match self {
            Self::Npm(meta) => &meta.extra,
            Self::Pypi(meta) => &meta.extra,
            Self::Git(meta) => &meta.extra,
            Self::Docker(meta) => &meta.extra,
        }
    }
}
