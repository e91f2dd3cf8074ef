//! Lifecycle script scanning
//!
//! Scripts that run automatically during install (`preinstall`, `install`,
//! `postinstall`, `prepare`) are held to a stricter standard than scripts a
//! user has to invoke by hand.

use e14z_errors::{ConfigError, Error};
use e14z_types::{Severity, Threat, ThreatKind};
use regex::Regex;
use std::collections::BTreeMap;

const INSTALL_HOOKS: &[&str] = &[
    "preinstall",
    "install",
    "postinstall",
    "prepare",
    "prepublish",
    "preprepare",
    "postprepare",
];

struct Rule {
    kind: ThreatKind,
    pattern: Regex,
    /// Severity when found in an install hook
    hook_severity: Severity,
    /// Severity anywhere else
    other_severity: Severity,
    description: &'static str,
}

/// Compiled script patterns
pub struct ScriptScanner {
    rules: Vec<Rule>,
}

impl std::fmt::Debug for ScriptScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptScanner")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl ScriptScanner {
    /// Compile the built-in patterns
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self, Error> {
        let specs: [(ThreatKind, &str, Severity, Severity, &'static str); 5] = [
            (
                ThreatKind::EncodedPayload,
                r"base64\s+(-d|--decode)\b[^|]*\|\s*(ba|z|da)?sh\b",
                Severity::Critical,
                Severity::High,
                "decodes and executes an encoded payload",
            ),
            (
                ThreatKind::PipeToShell,
                r"\b(curl|wget)\b[^|]*\|\s*(sudo\s+)?((ba|z|da)?sh|node|python3?|perl)\b",
                Severity::Critical,
                Severity::High,
                "pipes a download into an interpreter",
            ),
            (
                ThreatKind::DestructiveCommand,
                r"(?i)\brm\s+(-[a-z]*r[a-z]*f|-[a-z]*f[a-z]*r|-r\s+-f|-f\s+-r|--recursive\s+--force|--force\s+--recursive)\b",
                Severity::Critical,
                Severity::Medium,
                "removes files recursively",
            ),
            (
                ThreatKind::DynamicEval,
                r"\beval\s*\(",
                Severity::Medium,
                Severity::Low,
                "evaluates dynamic code",
            ),
            (
                ThreatKind::DynamicEval,
                r"\bnode\s+(-e|--eval|-p|--print)\b",
                Severity::Medium,
                Severity::Low,
                "runs inline JavaScript",
            ),
        ];

        let rules = specs
            .into_iter()
            .map(|(kind, pattern, hook_severity, other_severity, description)| {
                Regex::new(pattern)
                    .map(|pattern| Rule {
                        kind,
                        pattern,
                        hook_severity,
                        other_severity,
                        description,
                    })
                    .map_err(|e| {
                        Error::from(ConfigError::Invalid {
                            message: format!("script pattern {pattern:?}: {e}"),
                        })
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// Scan every script; never fails, only accumulates findings
    #[must_use]
    pub fn scan(&self, scripts: &BTreeMap<String, String>) -> Vec<Threat> {
        let mut threats = Vec::new();
        for (name, body) in scripts {
            let is_hook = INSTALL_HOOKS.contains(&name.as_str());
            for rule in &self.rules {
                if !rule.pattern.is_match(body) {
                    continue;
                }
                let severity = if is_hook {
                    rule.hook_severity
                } else {
                    rule.other_severity
                };
                threats.push(Threat::new(
                    rule.kind,
                    severity,
                    format!("script `{name}` {}", rule.description),
                ));
            }
        }
        threats
    }
}
