//! `pip install`, `python -m pip install`, `uvx` and `pipx`

use crate::validate::{validate_name, validate_version};
use e14z_errors::ParseError;
use e14z_types::{PackageDescriptor, Registry, LATEST};

pub(crate) fn parse_pip(args: &[String], raw: &str) -> Result<PackageDescriptor, ParseError> {
    match args.split_first() {
        Some((sub, rest)) if sub == "install" => first_requirement(rest),
        _ => Err(unknown(raw)),
    }
}

/// `python[3] -m pip install <pkg>`
pub(crate) fn parse_python_module(
    args: &[String],
    raw: &str,
) -> Result<PackageDescriptor, ParseError> {
    match args {
        [flag, module, rest @ ..] if flag == "-m" && (module == "pip" || module == "pip3") => {
            parse_pip(rest, raw)
        }
        _ => Err(unknown(raw)),
    }
}

/// `uvx [--from <req>] <pkg>[==version] [args...]`
pub(crate) fn parse_uvx(args: &[String]) -> Result<PackageDescriptor, ParseError> {
    if let [flag, from, rest @ ..] = args {
        if flag == "--from" {
            let mut descriptor = parse_requirement(from)?;
            descriptor.extra_args = rest.iter().skip(1).cloned().collect();
            return Ok(descriptor);
        }
    }
    let (spec, rest) = args.split_first().ok_or_else(|| ParseError::MissingArgument {
        what: "python package".to_string(),
    })?;
    let mut descriptor = parse_requirement(spec)?;
    descriptor.extra_args = rest.to_vec();
    Ok(descriptor)
}

/// `pipx run|install <pkg>`
pub(crate) fn parse_pipx(args: &[String], raw: &str) -> Result<PackageDescriptor, ParseError> {
    match args.split_first() {
        Some((sub, rest)) if sub == "run" || sub == "install" => {
            let (spec, extra) = rest
                .iter()
                .position(|arg| !arg.starts_with('-'))
                .map(|idx| (&rest[idx], &rest[idx + 1..]))
                .ok_or_else(|| ParseError::MissingArgument {
                    what: "python package".to_string(),
                })?;
            let mut descriptor = parse_requirement(spec)?;
            descriptor.extra_args = extra.to_vec();
            Ok(descriptor)
        }
        _ => Err(unknown(raw)),
    }
}

fn first_requirement(args: &[String]) -> Result<PackageDescriptor, ParseError> {
    let spec = args
        .iter()
        .find(|arg| !arg.starts_with('-'))
        .ok_or_else(|| ParseError::MissingArgument {
            what: "python package".to_string(),
        })?;
    parse_requirement(spec)
}

/// `name[extras]==version`; only exact pins are accepted
pub(crate) fn parse_requirement(spec: &str) -> Result<PackageDescriptor, ParseError> {
    let (name_part, version) = match spec.split_once("==") {
        Some((name, version)) => (name, Some(version)),
        None => (spec, None),
    };

    // extras select optional dependencies and do not change identity
    let name = match name_part.split_once('[') {
        Some((name, extras)) if extras.ends_with(']') => name,
        Some(_) => {
            return Err(ParseError::InvalidName {
                name: name_part.to_string(),
                reason: "unterminated extras".to_string(),
            })
        }
        None => name_part,
    };

    if name.contains(['<', '>', '=', '!', '~']) {
        return Err(ParseError::InvalidVersion {
            name: name.to_string(),
            version: spec.to_string(),
        });
    }
    validate_name(name, &[])?;

    let version = match version {
        Some(v) => {
            validate_version(name, v)?;
            v
        }
        None => LATEST,
    };
    Ok(PackageDescriptor::new(Registry::Pypi, name, version))
}

fn unknown(raw: &str) -> ParseError {
    ParseError::UnknownGrammar {
        command: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::parse;
    use e14z_errors::ParseError;
    use e14z_types::{Registry, LATEST};

    #[test]
    fn test_pip_install_pinned() {
        let desc = parse("pip install mcp-server-fetch==0.6.2").unwrap();
        assert_eq!(desc.registry, Registry::Pypi);
        assert_eq!(desc.name, "mcp-server-fetch");
        assert_eq!(desc.version, "0.6.2");
    }

    #[test]
    fn test_pip_variants() {
        assert_eq!(parse("pip3 install -U requests").unwrap().name, "requests");
        assert_eq!(
            parse("python3 -m pip install mcp[cli]").unwrap().name,
            "mcp"
        );
        assert_eq!(parse("python -m pip install httpx").unwrap().version, LATEST);
        assert!(parse("python script.py").is_err());
        assert!(parse("pip uninstall requests").is_err());
    }

    #[test]
    fn test_uvx() {
        let desc = parse("uvx mcp-server-time==1.0.0 --local-timezone UTC").unwrap();
        assert_eq!(desc.name, "mcp-server-time");
        assert_eq!(desc.version, "1.0.0");
        assert_eq!(desc.extra_args, vec!["--local-timezone", "UTC"]);

        let desc = parse("uvx --from mcp-server-git mcp-server-git --repository .").unwrap();
        assert_eq!(desc.name, "mcp-server-git");
        assert_eq!(desc.extra_args, vec!["--repository", "."]);
    }

    #[test]
    fn test_pipx() {
        assert_eq!(parse("pipx run black").unwrap().name, "black");
        assert!(parse("pipx list").is_err());
    }

    #[test]
    fn test_ranges_rejected() {
        assert!(matches!(
            parse("pip install 'requests>=2.0'"),
            Err(ParseError::InvalidVersion { .. })
        ));
    }
}
