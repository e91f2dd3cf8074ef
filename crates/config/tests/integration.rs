//! Integration tests for config

#[cfg(test)]
mod tests {
    use e14z_config::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to ensure env var tests don't run concurrently
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "E14Z_CACHE_DIR",
        "E14Z_TIMEOUT",
        "E14Z_MAX_CONCURRENCY",
        "E14Z_MAX_RETRIES",
        "E14Z_LOG",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[cache]
root = "/var/cache/e14z"
max_age_days = 7

[security]
min_score = 70
malicious_packages = ["evil-pkg"]

[sandbox]
timeout_secs = 15
kill_grace_ms = 250

[retry]
max_retries = 5

[install]
max_concurrency = 2
min_tools_for_healthy = 3
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.cache.root_dir(), PathBuf::from("/var/cache/e14z"));
        assert_eq!(config.cache.max_age_days, 7);
        assert_eq!(config.security.min_score, 70);
        assert_eq!(config.security.malicious_packages, vec!["evil-pkg"]);
        // defaults survive partial sections
        assert!(config
            .security
            .allowed_commands
            .iter()
            .any(|c| c == "npx"));
        assert_eq!(config.sandbox.timeout_secs, 15);
        assert_eq!(config.sandbox.kill_grace().as_millis(), 250);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.install.max_concurrency, 2);
        assert_eq!(config.install.min_tools_for_healthy, 3);
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let result = Config::load_from_file(std::path::Path::new("/nonexistent/e14z.toml")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(Config::from_toml("[install\nmax_concurrency = ").is_err());
        assert!(Config::from_toml("[install]\nmax_concurrency = \"many\"").is_err());
    }

    #[test]
    fn test_merge_env() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("E14Z_CACHE_DIR", "/tmp/e14z-test-cache");
        std::env::set_var("E14Z_TIMEOUT", "42");
        std::env::set_var("E14Z_MAX_CONCURRENCY", "8");
        std::env::set_var("E14Z_MAX_RETRIES", "1");
        std::env::set_var("E14Z_LOG", "debug");

        let mut config = Config::default();
        config.merge_env().unwrap();

        assert_eq!(
            config.cache.root_dir(),
            PathBuf::from("/tmp/e14z-test-cache")
        );
        assert_eq!(config.install.timeout_secs, 42);
        assert_eq!(config.install.max_concurrency, 8);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.general.log_filter, "debug");

        clear_env();
    }

    #[test]
    fn test_invalid_env_value() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        clear_env();

        std::env::set_var("E14Z_MAX_CONCURRENCY", "lots");

        let mut config = Config::default();
        assert!(config.merge_env().is_err());

        clear_env();
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.validate().unwrap();
        config.install.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }
}
