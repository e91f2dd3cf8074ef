//! Verification findings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Points subtracted from the 100-point score per finding
    #[must_use]
    pub fn penalty(self) -> u8 {
        match self {
            Self::Low => 5,
            Self::Medium => 15,
            Self::High => 30,
            Self::Critical => 60,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// What a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    Typosquatting,
    KnownMalicious,
    PipeToShell,
    DestructiveCommand,
    DynamicEval,
    EncodedPayload,
    Oversized,
}

/// A single verification finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threat {
    pub kind: ThreatKind,
    pub message: String,
    pub severity: Severity,
}

impl Threat {
    pub fn new(kind: ThreatKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
        }
    }
}

/// Result of one verification pass; immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    threats: Vec<Threat>,
    warnings: Vec<String>,
    score: u8,
    is_malicious: bool,
}

impl ValidationResult {
    /// Build a result, deriving the advisory score from the findings
    #[must_use]
    pub fn new(threats: Vec<Threat>, warnings: Vec<String>, is_malicious: bool) -> Self {
        let penalty: u32 = threats.iter().map(|t| u32::from(t.severity.penalty())).sum();
        let score = if is_malicious {
            0
        } else {
            u8::try_from(100u32.saturating_sub(penalty)).unwrap_or(0)
        };
        Self {
            threats,
            warnings,
            score,
            is_malicious,
        }
    }

    #[must_use]
    pub fn threats(&self) -> &[Threat] {
        &self.threats
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Advisory score in `0..=100`
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn is_malicious(&self) -> bool {
        self.is_malicious
    }

    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.threats.iter().any(|t| t.severity == Severity::Critical)
    }

    /// Whether installation must not proceed
    #[must_use]
    pub fn is_blocking(&self, min_score: u8) -> bool {
        self.is_malicious || self.has_critical() || self.score < min_score
    }

    /// One-line summary of the most severe finding
    #[must_use]
    pub fn primary_reason(&self) -> Option<&str> {
        self.threats
            .iter()
            .max_by_key(|t| t.severity)
            .map(|t| t.message.as_str())
    }
}
