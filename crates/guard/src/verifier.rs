//! Descriptor + metadata verification

use crate::typosquat::find_typosquat_target;
use crate::{ReputationDb, ScriptScanner};
use e14z_config::SecurityConfig;
use e14z_errors::{Error, SecurityError};
use e14z_types::{
    PackageDescriptor, PackageMetadata, Severity, Threat, ThreatKind, ValidationResult,
};
use std::sync::Arc;

/// Reputation verifier shared by all install requests
#[derive(Debug, Clone)]
pub struct Verifier {
    db: Arc<ReputationDb>,
    scanner: Arc<ScriptScanner>,
    max_package_size: u64,
    min_score: u8,
}

impl Verifier {
    /// Create a verifier over a shared reputation database
    ///
    /// # Errors
    ///
    /// Returns an error if the script patterns fail to compile.
    pub fn new(db: Arc<ReputationDb>, config: &SecurityConfig) -> Result<Self, Error> {
        Ok(Self {
            db,
            scanner: Arc::new(ScriptScanner::new()?),
            max_package_size: config.max_package_size,
            min_score: config.min_score,
        })
    }

    /// Verifier with the built-in lists extended by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the script patterns fail to compile.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, Error> {
        Self::new(Arc::new(ReputationDb::from_config(config)), config)
    }

    #[must_use]
    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    /// Accumulate findings for a package; never fails
    #[must_use]
    pub fn analyze(
        &self,
        descriptor: &PackageDescriptor,
        metadata: Option<&PackageMetadata>,
    ) -> ValidationResult {
        let full_name = descriptor.full_name();
        let mut threats = Vec::new();
        let mut warnings = Vec::new();

        let is_malicious = self.db.is_malicious(&full_name, &descriptor.version);
        if is_malicious {
            threats.push(Threat::new(
                ThreatKind::KnownMalicious,
                Severity::Critical,
                format!("{full_name} is on the malicious package denylist"),
            ));
        }

        if let Some((target, method)) =
            find_typosquat_target(&self.db, &full_name, descriptor.scope.as_deref())
        {
            threats.push(Threat::new(
                ThreatKind::Typosquatting,
                Severity::High,
                format!(
                    "{full_name} looks like a typosquat of {target} ({})",
                    method.as_str()
                ),
            ));
        }

        if let Some(metadata) = metadata {
            if let Some(scripts) = metadata.scripts() {
                threats.extend(self.scanner.scan(scripts));
            }
            match metadata.size() {
                Some(size) if size > self.max_package_size => threats.push(Threat::new(
                    ThreatKind::Oversized,
                    Severity::High,
                    format!(
                        "package size {size} bytes exceeds limit of {} bytes",
                        self.max_package_size
                    ),
                )),
                Some(_) => {}
                None => warnings.push("registry did not report a package size".to_string()),
            }
            if metadata.registry() != descriptor.registry {
                warnings.push(format!(
                    "metadata describes a {} package but the command targets {}",
                    metadata.registry(),
                    descriptor.registry
                ));
            }
        } else {
            warnings.push("no registry metadata; install scripts were not scanned".to_string());
        }

        let result = ValidationResult::new(threats, warnings, is_malicious);
        tracing::debug!(
            package = %full_name,
            score = result.score(),
            threats = result.threats().len(),
            malicious = result.is_malicious(),
            "verification finished"
        );
        result
    }

    /// Analyze and turn a blocking verdict into an error
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::Quarantined`] for denylisted packages and
    /// [`SecurityError::VerificationBlocked`] for any other blocking result.
    pub fn check(
        &self,
        descriptor: &PackageDescriptor,
        metadata: Option<&PackageMetadata>,
    ) -> Result<ValidationResult, SecurityError> {
        let result = self.analyze(descriptor, metadata);
        if !result.is_blocking(self.min_score) {
            for warning in result.warnings() {
                tracing::warn!(package = %descriptor.full_name(), "{warning}");
            }
            return Ok(result);
        }

        let reason = result
            .primary_reason()
            .unwrap_or("score below threshold")
            .to_string();
        if result.is_malicious() {
            Err(SecurityError::Quarantined {
                package: descriptor.full_name(),
                reason,
            })
        } else {
            Err(SecurityError::VerificationBlocked {
                package: descriptor.full_name(),
                score: result.score(),
                reason,
            })
        }
    }
}
