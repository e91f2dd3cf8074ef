//! Immutable reputation data

use e14z_config::SecurityConfig;
use std::collections::BTreeSet;

const POPULAR_PACKAGES: &[&str] = &[
    // npm
    "express", "lodash", "react", "react-dom", "axios", "chalk", "commander", "request",
    "moment", "debug", "webpack", "typescript", "eslint", "jquery", "underscore", "async",
    "uuid", "dotenv", "yargs", "minimist", "colors", "mongoose", "body-parser", "cross-env",
    "node-fetch", "socket.io", "electron", "prettier", "jest", "mocha", "zod", "puppeteer",
    "playwright", "nodemailer", "sqlite3", "mysql", "redis", "bcrypt", "jsonwebtoken",
    "@modelcontextprotocol/sdk",
    "@modelcontextprotocol/server-filesystem",
    "@modelcontextprotocol/server-github",
    "@modelcontextprotocol/server-memory",
    "@modelcontextprotocol/server-puppeteer",
    // pypi
    "requests", "numpy", "pandas", "django", "flask", "urllib3", "setuptools", "boto3",
    "pyyaml", "cryptography", "fastapi", "pydantic", "httpx", "mcp", "python-dateutil",
    "jellyfish", "colorama",
];

const MALICIOUS_PACKAGES: &[&str] = &[
    "crossenv", "cross-env.js", "d3.js", "fabric-js", "ffmepg", "gruntcli", "http-proxy.js",
    "jquery.js", "mongose", "mssql.js", "mssql-node", "mysqljs", "nodecaffe", "nodefabric",
    "node-fabric", "nodeffmpeg", "nodemailer-js", "nodemailer.js", "nodemssql",
    "node-opencv", "node-opensl", "node-openssl", "noderequest", "nodesass", "nodesqlite",
    "node-sqlite", "node-tkinter", "opencv.js", "openssl.js", "proxy.js", "shadowsock",
    "sqlite.js", "sqliter", "sqlserver", "tkinter", "flatmap-stream", "event-stream@3.3.6",
    "eslint-scope@3.7.2", "colourama", "python3-dateutil", "jeilyfish", "discord-selfbot-v14",
];

const TRUSTED_SCOPES: &[&str] = &[
    "types", "modelcontextprotocol", "anthropic-ai", "babel", "angular", "aws-sdk",
    "google-cloud", "microsoft", "azure", "vue", "nestjs", "octokit",
];

/// Popular names, denylist and trusted scopes
///
/// Built once at startup and shared behind an `Arc`; never mutated.
#[derive(Debug, Clone)]
pub struct ReputationDb {
    popular: BTreeSet<String>,
    malicious: BTreeSet<String>,
    trusted_scopes: BTreeSet<String>,
}

impl Default for ReputationDb {
    fn default() -> Self {
        Self::from_lists(POPULAR_PACKAGES, MALICIOUS_PACKAGES, TRUSTED_SCOPES)
    }
}

impl ReputationDb {
    /// Built-in lists extended with the configured additions
    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        let mut db = Self::default();
        db.popular
            .extend(config.popular_packages.iter().map(|s| s.to_ascii_lowercase()));
        db.malicious
            .extend(config.malicious_packages.iter().map(|s| s.to_ascii_lowercase()));
        db.trusted_scopes.extend(
            config
                .trusted_scopes
                .iter()
                .map(|s| s.trim_start_matches('@').to_ascii_lowercase()),
        );
        db
    }

    #[must_use]
    pub fn from_lists(popular: &[&str], malicious: &[&str], trusted_scopes: &[&str]) -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_ascii_lowercase()).collect();
        Self {
            popular: owned(popular),
            malicious: owned(malicious),
            trusted_scopes: owned(trusted_scopes),
        }
    }

    #[must_use]
    pub fn is_popular(&self, name: &str) -> bool {
        self.popular.contains(&name.to_ascii_lowercase())
    }

    pub fn popular(&self) -> impl Iterator<Item = &str> {
        self.popular.iter().map(String::as_str)
    }

    /// Exact denylist match on `name` or `name@version`
    #[must_use]
    pub fn is_malicious(&self, name: &str, version: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.malicious.contains(&name) || self.malicious.contains(&format!("{name}@{version}"))
    }

    #[must_use]
    pub fn is_trusted_scope(&self, scope: &str) -> bool {
        self.trusted_scopes.contains(&scope.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let db = ReputationDb::default();
        assert!(db.is_popular("express"));
        assert!(db.is_popular("Express"));
        assert!(db.is_malicious("crossenv", "1.0.0"));
        assert!(db.is_malicious("event-stream", "3.3.6"));
        assert!(!db.is_malicious("event-stream", "4.0.1"));
        assert!(db.is_trusted_scope("types"));
    }

    #[test]
    fn test_config_additions() {
        let config = SecurityConfig {
            popular_packages: vec!["weather-mcp".into()],
            malicious_packages: vec!["Evil-Pkg".into()],
            trusted_scopes: vec!["@acme".into()],
            ..SecurityConfig::default()
        };
        let db = ReputationDb::from_config(&config);
        assert!(db.is_popular("weather-mcp"));
        assert!(db.is_malicious("evil-pkg", "latest"));
        assert!(db.is_trusted_scope("acme"));
        // built-ins survive
        assert!(db.is_popular("lodash"));
    }
}
