#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the e14z auto-installer
//!
//! This crate provides the data model shared by every stage of an install:
//! parsed package descriptors, registry metadata, verification results and
//! the outcome reported back to callers.

pub mod descriptor;
pub mod install;
pub mod metadata;
pub mod validation;

// Re-export commonly used types
pub use descriptor::{PackageDescriptor, Registry, LATEST};
pub use install::{
    ExecutionDetails, HealthTier, InstallOptions, InstallOutcome, InstallPhase, InstallSpec,
    InstallationMethod, ToolInfo,
};
pub use metadata::{DockerMetadata, GitMetadata, NpmMetadata, PackageMetadata, PypiMetadata};
pub use validation::{Severity, Threat, ThreatKind, ValidationResult};
