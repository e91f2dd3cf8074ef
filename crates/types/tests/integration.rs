//! Integration tests for types

#[cfg(test)]
mod tests {
    use e14z_errors::{categorize_message, ErrorCategory};
    use e14z_types::*;

    #[test]
    fn test_descriptor_full_name_and_key() {
        let mut desc = PackageDescriptor::new(Registry::Npm, "server-filesystem", LATEST);
        desc.scope = Some("modelcontextprotocol".into());
        assert_eq!(desc.full_name(), "@modelcontextprotocol/server-filesystem");
        assert!(desc.is_latest());
        assert_eq!(
            desc.cache_key(),
            (
                "@modelcontextprotocol/server-filesystem".to_string(),
                "latest".to_string()
            )
        );
        assert_eq!(
            desc.to_string(),
            "npm:@modelcontextprotocol/server-filesystem@latest"
        );
    }

    #[test]
    fn test_metadata_tagged_with_unknown_fields() {
        let json = r#"{
            "registry": "npm",
            "name": "left-pad",
            "scripts": {"postinstall": "node setup.js"},
            "size": 1024,
            "license": "MIT"
        }"#;
        let meta: PackageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.registry(), Registry::Npm);
        assert_eq!(meta.size(), Some(1024));
        assert_eq!(meta.scripts().unwrap()["postinstall"], "node setup.js");
        assert_eq!(meta.extra()["license"], "MIT");
    }

    #[test]
    fn test_validation_score_and_blocking() {
        let clean = ValidationResult::new(Vec::new(), Vec::new(), false);
        assert_eq!(clean.score(), 100);
        assert!(!clean.is_blocking(50));

        let warned = ValidationResult::new(
            vec![Threat::new(ThreatKind::Oversized, Severity::High, "too big")],
            Vec::new(),
            false,
        );
        assert_eq!(warned.score(), 70);
        assert!(!warned.is_blocking(50));
        assert!(warned.is_blocking(80));

        let critical = ValidationResult::new(
            vec![Threat::new(
                ThreatKind::DestructiveCommand,
                Severity::Critical,
                "rm -rf",
            )],
            Vec::new(),
            false,
        );
        assert!(critical.is_blocking(0));
        assert_eq!(critical.primary_reason(), Some("rm -rf"));

        let malicious = ValidationResult::new(Vec::new(), Vec::new(), true);
        assert_eq!(malicious.score(), 0);
        assert!(malicious.is_blocking(0));
    }

    #[test]
    fn test_select_command_prefers_method() {
        let spec = InstallSpec {
            name: "weather".into(),
            install_command: "npx -y weather-mcp".into(),
            install_type: "npm".into(),
            installation_methods: vec![
                InstallationMethod {
                    method_type: "docker".into(),
                    command: "docker run -i weather/mcp:1.0".into(),
                    description: None,
                    priority: Some(2),
                },
                InstallationMethod {
                    method_type: "docker".into(),
                    command: "docker run -i weather/mcp:latest".into(),
                    description: None,
                    priority: Some(1),
                },
            ],
        };
        assert_eq!(spec.select_command(None), Some("npx -y weather-mcp"));
        assert_eq!(
            spec.select_command(Some("docker")),
            Some("docker run -i weather/mcp:latest")
        );
        assert_eq!(spec.select_command(Some("npm")), Some("npx -y weather-mcp"));
        assert_eq!(spec.select_command(Some("pipx")), None);
    }

    #[test]
    fn test_failed_outcome_serialization() {
        let classified = categorize_message("ENOTFOUND registry.npmjs.org");
        let outcome = InstallOutcome::failed(&classified);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["category"], "network");
        assert_eq!(json["health"], "failed");
        assert!(json.get("tools").is_none());
        assert_eq!(outcome.category, Some(ErrorCategory::Network));

        let degraded = outcome.degraded_by_auth(vec!["GITHUB_TOKEN".into()]);
        assert_eq!(degraded.health, HealthTier::Degraded);
        assert!(degraded.suggestions[0].contains("GITHUB_TOKEN"));
    }
}
