//! The package directory the installer fetches install specs from

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use e14z_errors::{Error, RegistryError};
use e14z_types::{InstallSpec, PackageMetadata};
use serde::Deserialize;

/// Source of install specs and registry metadata, keyed by slug
#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_install_spec(&self, slug: &str) -> Result<InstallSpec, Error>;

    /// Published metadata used for script and size checks
    async fn get_metadata(&self, _slug: &str) -> Result<Option<PackageMetadata>, Error> {
        Ok(None)
    }
}

/// In-memory registry, also loadable from a JSON file
///
/// ```json
/// { "packages": { "time": { "name": "...", "installCommand": "...",
///                           "installType": "npm", "metadata": { ... } } } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    specs: HashMap<String, InstallSpec>,
    metadata: HashMap<String, PackageMetadata>,
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    packages: HashMap<String, RegistryRecord>,
}

#[derive(Deserialize)]
struct RegistryRecord {
    #[serde(flatten)]
    spec: InstallSpec,
    #[serde(default)]
    metadata: Option<PackageMetadata>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_spec(mut self, slug: impl Into<String>, spec: InstallSpec) -> Self {
        self.specs.insert(slug.into(), spec);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, slug: impl Into<String>, metadata: PackageMetadata) -> Self {
        self.metadata.insert(slug.into(), metadata);
        self
    }

    /// Parse the JSON registry format
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidData`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: RegistryFile =
            serde_json::from_str(json).map_err(|e| RegistryError::InvalidData {
                slug: "*".to_string(),
                message: e.to_string(),
            })?;
        let mut registry = Self::new();
        for (slug, record) in file.packages {
            if let Some(metadata) = record.metadata {
                registry.metadata.insert(slug.clone(), metadata);
            }
            registry.specs.insert(slug, record.spec);
        }
        Ok(registry)
    }

    /// Load a JSON registry file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn slugs(&self) -> Vec<&str> {
        let mut slugs: Vec<&str> = self.specs.keys().map(String::as_str).collect();
        slugs.sort_unstable();
        slugs
    }
}

#[async_trait]
impl Registry for StaticRegistry {
    async fn get_install_spec(&self, slug: &str) -> Result<InstallSpec, Error> {
        self.specs.get(slug).cloned().ok_or_else(|| {
            RegistryError::NotFound {
                slug: slug.to_string(),
            }
            .into()
        })
    }

    async fn get_metadata(&self, slug: &str) -> Result<Option<PackageMetadata>, Error> {
        Ok(self.metadata.get(slug).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_json() {
        let registry = StaticRegistry::from_json(
            r#"{
                "packages": {
                    "time": {
                        "name": "Time",
                        "installCommand": "npx -y @modelcontextprotocol/server-time",
                        "installType": "npm",
                        "installationMethods": [
                            { "type": "docker", "command": "docker run -i --rm mcp/time", "priority": 2 }
                        ],
                        "metadata": { "registry": "npm", "name": "@modelcontextprotocol/server-time", "size": 1024 }
                    }
                }
            }"#,
        )
        .unwrap();

        let spec = registry.get_install_spec("time").await.unwrap();
        assert_eq!(spec.install_type, "npm");
        assert_eq!(spec.installation_methods.len(), 1);
        assert_eq!(spec.select_command(Some("docker")), Some("docker run -i --rm mcp/time"));
        let meta = registry.get_metadata("time").await.unwrap().unwrap();
        assert_eq!(meta.size(), Some(1024));

        assert!(matches!(
            registry.get_install_spec("nope").await,
            Err(Error::Registry(RegistryError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(StaticRegistry::from_json("{ not json").is_err());
    }
}
