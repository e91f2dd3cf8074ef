//! Kernel resource limits applied to every sandboxed child

use e14z_config::SandboxConfig;

/// rlimits installed in the child between `fork` and `exec`
///
/// Each limit is clamped to the current hard limit so an unprivileged
/// process can always apply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub cpu_seconds: u64,
    /// Address-space limit (`RLIMIT_AS`), Linux only
    pub memory_bytes: u64,
    pub file_size_bytes: u64,
    pub open_files: u64,
}

impl ResourceLimits {
    #[must_use]
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            cpu_seconds: config.cpu_seconds,
            memory_bytes: config.memory_bytes,
            file_size_bytes: config.max_file_size_bytes,
            open_files: config.max_open_files,
        }
    }

    /// Apply the limits to the calling process
    ///
    /// Only performs `getrlimit`/`setrlimit` syscalls and does not
    /// allocate, so it is safe to call from a `pre_exec` hook.
    ///
    /// # Errors
    ///
    /// Returns the OS error of the first limit that could not be set.
    #[cfg(unix)]
    pub fn apply(&self) -> std::io::Result<()> {
        use nix::sys::resource::Resource;

        clamp_and_set(Resource::RLIMIT_CPU, self.cpu_seconds)?;
        #[cfg(target_os = "linux")]
        clamp_and_set(Resource::RLIMIT_AS, self.memory_bytes)?;
        clamp_and_set(Resource::RLIMIT_FSIZE, self.file_size_bytes)?;
        clamp_and_set(Resource::RLIMIT_NOFILE, self.open_files)?;
        Ok(())
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::from_config(&SandboxConfig::default())
    }
}

#[cfg(unix)]
fn clamp_and_set(resource: nix::sys::resource::Resource, requested: u64) -> std::io::Result<()> {
    use nix::sys::resource::{getrlimit, setrlimit};

    let (_, hard) = getrlimit(resource).map_err(std::io::Error::from)?;
    let limit = requested.min(hard);
    setrlimit(resource, limit, limit).map_err(std::io::Error::from)
}
