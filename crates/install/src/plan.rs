//! Per-registry install and launch commands
//!
//! Everything is installed into the package's own cache directory; nothing
//! touches global package locations. npm lifecycle scripts are disabled.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use e14z_errors::{Error, InstallError};
use e14z_sandbox::ExecRequest;
use e14z_types::{PackageDescriptor, PackageMetadata, Registry};
use serde_json::Value;
use tokio::fs;

const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Marker written for container packages, which keep no files locally
const IMAGE_MARKER: &str = "image-ref";

/// How to install and launch one descriptor inside `package_dir`
#[derive(Debug, Clone)]
pub struct InstallPlan {
    descriptor: PackageDescriptor,
    package_dir: PathBuf,
    step_timeout: Duration,
}

impl InstallPlan {
    #[must_use]
    pub fn new(descriptor: PackageDescriptor, package_dir: PathBuf, step_timeout: Duration) -> Self {
        Self {
            descriptor,
            package_dir,
            step_timeout,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &PackageDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn package_dir(&self) -> &Path {
        &self.package_dir
    }

    fn source_dir(&self) -> PathBuf {
        self.package_dir.join("src")
    }

    fn site_dir(&self) -> PathBuf {
        self.package_dir.join("site")
    }

    fn step(&self, command: &str) -> ExecRequest {
        ExecRequest::new(command)
            .cwd(&self.package_dir)
            .timeout(self.step_timeout)
    }

    /// Commands that fetch the package into `package_dir`
    #[must_use]
    pub fn install_steps(&self) -> Vec<ExecRequest> {
        let desc = &self.descriptor;
        let dir = self.package_dir.display().to_string();
        match desc.registry {
            Registry::Npm => vec![self.step("npm").args([
                "install",
                "--prefix",
                &dir,
                "--no-save",
                "--ignore-scripts",
                "--no-audit",
                "--no-fund",
                &npm_spec(desc),
            ])],
            Registry::Pypi => vec![self.pip_install(&pip_spec(desc))],
            Registry::Git => {
                let mut clone = self.step("git").args(["clone", "--depth", "1"]);
                if let Some(branch) = &desc.branch {
                    clone = clone.args(["--branch", branch.as_str()]);
                }
                let url = desc.repository_url.clone().unwrap_or_default();
                vec![clone.arg(url).arg(self.source_dir().display().to_string())]
            }
            Registry::Docker => vec![self.step("docker").args(["pull", &image_ref(desc)])],
        }
    }

    fn pip_install(&self, target: &str) -> ExecRequest {
        self.step("python3").args([
            "-m",
            "pip",
            "install",
            "--no-input",
            "--disable-pip-version-check",
            "--target",
            &self.site_dir().display().to_string(),
            target,
        ])
    }

    /// Steps that depend on what the first steps fetched
    ///
    /// Only cloned repositories need these: their dependencies are
    /// installed according to the manifest they ship.
    pub async fn follow_up_steps(&self) -> Vec<ExecRequest> {
        if self.descriptor.registry != Registry::Git {
            return Vec::new();
        }
        let src = self.source_dir();
        if exists(&src.join("package.json")).await {
            vec![self
                .step("npm")
                .cwd(&src)
                .args(["install", "--ignore-scripts", "--no-audit", "--no-fund"])]
        } else if exists(&src.join("pyproject.toml")).await || exists(&src.join("setup.py")).await {
            vec![self.pip_install(&src.display().to_string())]
        } else {
            Vec::new()
        }
    }

    /// Write files a package kind needs besides what its steps produced
    ///
    /// # Errors
    ///
    /// Returns an error if the marker file cannot be written.
    pub async fn finalize(&self) -> Result<(), Error> {
        if self.descriptor.registry == Registry::Docker {
            let marker = self.package_dir.join(IMAGE_MARKER);
            fs::write(&marker, image_ref(&self.descriptor))
                .await
                .map_err(|e| Error::io_with_path(&e, &marker))?;
        }
        Ok(())
    }

    /// The command that starts the installed MCP server
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::MissingEntryPoint`] when nothing runnable
    /// can be found in the installed files.
    pub async fn entry_point(
        &self,
        metadata: Option<&PackageMetadata>,
        env: &BTreeMap<String, String>,
    ) -> Result<ExecRequest, Error> {
        let desc = &self.descriptor;
        let request = match desc.registry {
            Registry::Npm => {
                let bin = self.npm_bin(metadata).await;
                let bin_dir = self.package_dir.join("node_modules").join(".bin");
                ExecRequest::new(&bin)
                    .package_bin(&bin)
                    .env("PATH", prepend_path(&bin_dir))
            }
            Registry::Pypi => ExecRequest::new("python3")
                .args(["-m", &python_module(desc, metadata)])
                .env("PYTHONPATH", self.site_dir().display().to_string()),
            Registry::Git => self.git_entry().await?,
            Registry::Docker => {
                let mut args = vec!["run".to_string(), "-i".to_string(), "--rm".to_string()];
                for key in env.keys() {
                    args.push("-e".to_string());
                    args.push(key.clone());
                }
                args.push(image_ref(desc));
                ExecRequest::new("docker").args(args)
            }
        };
        Ok(request
            .args(desc.extra_args.iter().cloned())
            .cwd(&self.package_dir)
            .envs(env))
    }

    /// Binary name declared by the installed package
    async fn npm_bin(&self, metadata: Option<&PackageMetadata>) -> String {
        let unscoped = self.descriptor.name.clone();
        let manifest = self
            .package_dir
            .join("node_modules")
            .join(self.descriptor.full_name())
            .join("package.json");
        let installed = read_json(&manifest).await;
        match installed.as_ref().and_then(|m| m.get("bin")) {
            Some(Value::String(_)) => return unscoped,
            Some(Value::Object(bins)) => {
                if bins.contains_key(&unscoped) {
                    return unscoped;
                }
                if let Some(first) = bins.keys().next() {
                    return first.clone();
                }
            }
            _ => {}
        }
        if let Some(PackageMetadata::Npm(meta)) = metadata {
            if let Some(first) = meta.bin.keys().next() {
                return first.clone();
            }
        }
        unscoped
    }

    async fn git_entry(&self) -> Result<ExecRequest, Error> {
        let src = self.source_dir();
        if let Some(manifest) = read_json(&src.join("package.json")).await {
            let script = match manifest.get("bin") {
                Some(Value::String(path)) => Some(path.clone()),
                Some(Value::Object(bins)) => bins.values().find_map(Value::as_str).map(str::to_string),
                _ => None,
            }
            .or_else(|| manifest.get("main").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "index.js".to_string());
            let path = src.join(script);
            if exists(&path).await {
                return Ok(ExecRequest::new("node").arg(path.display().to_string()));
            }
        }
        for candidate in ["server.py", "main.py"] {
            let path = src.join(candidate);
            if exists(&path).await {
                return Ok(ExecRequest::new("python3")
                    .arg(path.display().to_string())
                    .env("PYTHONPATH", self.site_dir().display().to_string()));
            }
        }
        if exists(&self.site_dir()).await {
            return Ok(ExecRequest::new("python3")
                .args(["-m", &self.descriptor.name.replace('-', "_")])
                .env("PYTHONPATH", self.site_dir().display().to_string()));
        }
        Err(InstallError::MissingEntryPoint {
            package: self.descriptor.full_name(),
        }
        .into())
    }
}

/// `name` or `name@version`
fn npm_spec(desc: &PackageDescriptor) -> String {
    if desc.is_latest() {
        desc.full_name()
    } else {
        format!("{}@{}", desc.full_name(), desc.version)
    }
}

fn pip_spec(desc: &PackageDescriptor) -> String {
    if desc.is_latest() {
        desc.name.clone()
    } else {
        format!("{}=={}", desc.name, desc.version)
    }
}

/// `image:tag`, or `image@sha256:...` for digests
fn image_ref(desc: &PackageDescriptor) -> String {
    if desc.version.contains(':') {
        format!("{}@{}", desc.name, desc.version)
    } else {
        format!("{}:{}", desc.name, desc.version)
    }
}

/// Module to run with `python -m`: the first console script's module, or
/// the distribution name with dashes replaced
fn python_module(desc: &PackageDescriptor, metadata: Option<&PackageMetadata>) -> String {
    if let Some(PackageMetadata::Pypi(meta)) = metadata {
        if let Some(target) = meta.entry_points.values().next() {
            let module = target.split(':').next().unwrap_or(target).trim();
            if !module.is_empty() {
                return module.to_string();
            }
        }
    }
    desc.name.replace('-', "_").to_ascii_lowercase()
}

fn prepend_path(dir: &Path) -> String {
    let host = std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string());
    format!("{}:{host}", dir.display())
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

async fn read_json(path: &Path) -> Option<Value> {
    let bytes = fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}
