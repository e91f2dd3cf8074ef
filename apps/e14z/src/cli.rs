//! Command line interface definition

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// e14z - install, verify and launch MCP servers
#[derive(Parser)]
#[command(name = "e14z")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Secure auto-installer and launcher for MCP servers")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the cache root
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Install a package from the registry if needed, start it and list its tools
    Run {
        /// Package slug as listed in the registry
        slug: String,

        /// JSON registry file with install specs
        #[arg(long, env = "E14Z_REGISTRY", value_name = "PATH")]
        registry: PathBuf,

        /// Preferred installation method (npm, pypi, docker, ...)
        #[arg(long)]
        method: Option<String>,

        /// Environment passed to the server, as KEY=VALUE
        #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        env: Vec<(String, String)>,

        /// Overall timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Run the security checks on an install command
    Verify {
        /// Install command, e.g. "npx -y @scope/server"
        command: String,
    },

    /// Show how an install command is understood
    Parse {
        /// Install command, e.g. "pip install mcp-server-fetch==0.6.2"
        command: String,
    },

    /// Inspect and maintain the package cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Number of cached packages and their total size
    Stats,

    /// List cached packages
    #[command(alias = "ls")]
    List,

    /// Evict old, oversized or corrupted entries
    Clean {
        /// Remove entries not used for this many days
        #[arg(long)]
        max_age_days: Option<u64>,

        /// Shrink the cache to at most this many bytes
        #[arg(long)]
        max_size: Option<u64>,

        /// Keep entries whose content no longer matches their hash
        #[arg(long)]
        keep_corrupted: bool,
    },

    /// Re-hash every entry and report mismatches
    Verify,

    /// Undo install attempts left half-done by a crash
    ///
    /// Attempts still owned by a running e14z process are skipped.
    Recover,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty variable name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_val() {
        assert_eq!(
            parse_key_val("GITHUB_TOKEN=a=b").unwrap(),
            ("GITHUB_TOKEN".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("NOVALUE").is_err());
        assert!(parse_key_val("=x").is_err());
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from([
            "e14z", "run", "time", "--registry", "reg.json", "-e", "TZ=UTC", "--timeout", "30",
        ])
        .unwrap();
        let Commands::Run {
            slug, env, timeout, ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(slug, "time");
        assert_eq!(env, vec![("TZ".to_string(), "UTC".to_string())]);
        assert_eq!(timeout, Some(30));
    }
}
