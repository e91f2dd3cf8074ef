#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Install-command parsers
//!
//! Turns the untrusted install command a registry hands out (`npx -y pkg`,
//! `pip install pkg==1.0`, `git clone url`, `docker run image`) into a
//! [`PackageDescriptor`]. Parsing is pure: nothing here touches the
//! filesystem or network, and every accepted name and version is free of
//! shell metacharacters.

mod docker;
mod git;
mod npm;
mod pip;
mod tokenize;
mod validate;

pub use tokenize::tokenize;
pub use validate::{is_safe_token, validate_name, validate_version};

use e14z_errors::ParseError;
use e14z_types::{PackageDescriptor, Registry};

/// Parse a raw install command into a descriptor
///
/// # Errors
///
/// Returns a [`ParseError`] when the command is empty, uses an unknown
/// grammar, or names a package or version that fails validation.
pub fn parse(raw_command: &str) -> Result<PackageDescriptor, ParseError> {
    let tokens = tokenize(raw_command)?;
    let Some(program) = tokens.first() else {
        return Err(ParseError::EmptyCommand);
    };

    let rest = &tokens[1..];
    let descriptor = match program.as_str() {
        "npx" => npm::parse_npx(rest)?,
        "npm" => npm::parse_npm(rest, raw_command)?,
        "pip" | "pip3" => pip::parse_pip(rest, raw_command)?,
        "python" | "python3" => pip::parse_python_module(rest, raw_command)?,
        "uvx" => pip::parse_uvx(rest)?,
        "pipx" => pip::parse_pipx(rest, raw_command)?,
        "git" => git::parse_git(rest, raw_command)?,
        "docker" => docker::parse_docker(rest, raw_command)?,
        _ => {
            return Err(ParseError::UnknownGrammar {
                command: raw_command.to_string(),
            })
        }
    };

    tracing::debug!(
        registry = %descriptor.registry,
        package = %descriptor.full_name(),
        version = %descriptor.version,
        "parsed install command"
    );
    Ok(descriptor)
}

/// Parse with a registry hint; fails if the command targets another registry
///
/// # Errors
///
/// Returns [`ParseError::UnknownGrammar`] on a registry mismatch, otherwise
/// the same errors as [`parse`].
pub fn parse_as(registry: Registry, raw_command: &str) -> Result<PackageDescriptor, ParseError> {
    let descriptor = parse(raw_command)?;
    if descriptor.registry == registry {
        Ok(descriptor)
    } else {
        Err(ParseError::UnknownGrammar {
            command: raw_command.to_string(),
        })
    }
}

/// Default install command for an npm package that has none listed
#[must_use]
pub fn install_command_for(package_name: &str) -> String {
    format!("npx -y {package_name}")
}
