//! Fixed names that are not exposed through configuration

/// Directory under the platform config/cache dirs
pub const APP_DIR: &str = "e14z";

pub const CONFIG_FILE: &str = "config.toml";

/// Per-package metadata file, excluded from the content hash
pub const ENTRY_FILE: &str = ".e14z-entry.json";

/// Directory under the cache root holding transaction journals
pub const JOURNAL_DIR: &str = ".journal";

/// Fallback cache root when no platform cache dir exists
pub const FALLBACK_CACHE_ROOT: &str = "/tmp/e14z/packages";

pub const ENV_CACHE_DIR: &str = "E14Z_CACHE_DIR";
pub const ENV_TIMEOUT: &str = "E14Z_TIMEOUT";
pub const ENV_MAX_CONCURRENCY: &str = "E14Z_MAX_CONCURRENCY";
pub const ENV_MAX_RETRIES: &str = "E14Z_MAX_RETRIES";
pub const ENV_LOG: &str = "E14Z_LOG";

/// Commands a package may be launched through
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &[
    "npx", "npm", "uvx", "node", "python", "python3", "pip", "docker", "git",
];

/// Host environment variables passed through to sandboxed children
pub const DEFAULT_ENV_PASSTHROUGH: &[&str] = &["PATH", "HOME", "LANG"];
