//! Integration tests for the e14z CLI

use std::process::Command;

use tempfile::TempDir;

fn e14z(cache: &TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_e14z"));
    cmd.arg("--cache-dir").arg(cache.path());
    cmd.env_remove("E14Z_REGISTRY");
    cmd
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_e14z"))
        .arg("--version")
        .output()
        .expect("Failed to execute e14z");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("e14z"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_e14z"))
        .arg("--help")
        .output()
        .expect("Failed to execute e14z");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("MCP servers"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("verify"));
    assert!(stdout.contains("cache"));
}

#[test]
fn test_parse_json() {
    let cache = TempDir::new().unwrap();
    let output = e14z(&cache)
        .args(["--json", "parse", "npx -y @modelcontextprotocol/server-time@1.0.0 --local"])
        .output()
        .expect("Failed to execute e14z");

    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["registry"], "npm");
    assert_eq!(parsed["scope"], "modelcontextprotocol");
    assert_eq!(parsed["name"], "server-time");
    assert_eq!(parsed["version"], "1.0.0");
}

#[test]
fn test_parse_rejects_unknown_grammar() {
    let cache = TempDir::new().unwrap();
    let output = e14z(&cache)
        .args(["parse", "curl https://example.com/install.sh"])
        .output()
        .expect("Failed to execute e14z");

    assert!(!output.status.success());
}

#[test]
fn test_verify_blocks_denylisted() {
    let cache = TempDir::new().unwrap();
    let output = e14z(&cache)
        .args(["--json", "verify", "npx -y crossenv"])
        .output()
        .expect("Failed to execute e14z");

    assert!(!output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["score"], 0);
    assert_eq!(result["is_malicious"], true);
}

#[test]
fn test_cache_stats_on_empty_cache() {
    let cache = TempDir::new().unwrap();
    let output = e14z(&cache)
        .args(["--json", "cache", "stats"])
        .output()
        .expect("Failed to execute e14z");

    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["packageCount"], 0);
    assert_eq!(stats["totalSize"], 0);
}

#[test]
fn test_run_requires_registry() {
    let cache = TempDir::new().unwrap();
    let output = e14z(&cache)
        .args(["run", "time"])
        .output()
        .expect("Failed to execute e14z");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--registry"));
}
