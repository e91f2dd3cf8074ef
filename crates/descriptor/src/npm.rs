//! `npx [-y|--yes] <pkg>[@version] [args...]`

use crate::validate::{validate_name, validate_version};
use e14z_errors::ParseError;
use e14z_types::{PackageDescriptor, Registry, LATEST};

const NPX_SWITCHES: &[&str] = &["-y", "--yes", "-q", "--quiet", "--no-install"];

pub(crate) fn parse_npx(args: &[String]) -> Result<PackageDescriptor, ParseError> {
    let mut iter = args.iter();
    let spec = loop {
        match iter.next() {
            Some(arg) if NPX_SWITCHES.contains(&arg.as_str()) => {}
            Some(arg) if arg.starts_with('-') => {
                return Err(ParseError::UnknownGrammar {
                    command: format!("npx {}", args.join(" ")),
                })
            }
            Some(arg) => break arg,
            None => {
                return Err(ParseError::MissingArgument {
                    what: "npm package".to_string(),
                })
            }
        }
    };

    let mut descriptor = parse_package_spec(spec)?;
    descriptor.extra_args = iter.cloned().collect();
    Ok(descriptor)
}

/// `npm install|i|exec <pkg>`; global and save flags are ignored
pub(crate) fn parse_npm(args: &[String], raw: &str) -> Result<PackageDescriptor, ParseError> {
    match args.first().map(String::as_str) {
        Some("install" | "i" | "exec" | "x") => {}
        _ => {
            return Err(ParseError::UnknownGrammar {
                command: raw.to_string(),
            })
        }
    }
    let spec = args[1..]
        .iter()
        .find(|arg| !arg.starts_with('-'))
        .ok_or_else(|| ParseError::MissingArgument {
            what: "npm package".to_string(),
        })?;
    parse_package_spec(spec)
}

/// Split `@scope/name@version` / `name@version`
///
/// The version separator is the last `@` that is not the leading scope
/// marker.
pub(crate) fn parse_package_spec(spec: &str) -> Result<PackageDescriptor, ParseError> {
    let (body, version) = match spec.rfind('@') {
        Some(0) | None => (spec, None),
        Some(idx) => (&spec[..idx], Some(&spec[idx + 1..])),
    };

    let (scope, name) = if let Some(scoped) = body.strip_prefix('@') {
        let (scope, name) = scoped.split_once('/').ok_or_else(|| ParseError::MalformedScope {
            name: spec.to_string(),
        })?;
        if scope.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ParseError::MalformedScope {
                name: spec.to_string(),
            });
        }
        validate_name(scope, &[])?;
        (Some(scope.to_string()), name)
    } else {
        (None, body)
    };

    validate_name(name, &[])?;
    let version = match version {
        Some(v) => {
            validate_version(name, v)?;
            v
        }
        None => LATEST,
    };

    let mut descriptor = PackageDescriptor::new(Registry::Npm, name, version);
    descriptor.scope = scope;
    Ok(descriptor)
}
