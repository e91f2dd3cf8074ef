//! `git clone [flags] <url> [dir] [-b|--branch <branch>]`

use crate::validate::{is_safe_token, validate_name};
use e14z_errors::ParseError;
use e14z_types::{PackageDescriptor, Registry, LATEST};

const VALUE_FLAGS: &[&str] = &["--depth", "--origin", "-o", "--filter"];

pub(crate) fn parse_git(args: &[String], raw: &str) -> Result<PackageDescriptor, ParseError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(unknown(raw));
    };
    if sub != "clone" {
        return Err(unknown(raw));
    }

    let mut url: Option<&str> = None;
    let mut branch: Option<&str> = None;
    let mut iter = rest.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-b" | "--branch" => {
                let value = iter.next().ok_or_else(|| ParseError::MissingArgument {
                    what: "branch name".to_string(),
                })?;
                branch = Some(value);
            }
            flag if flag.starts_with("--branch=") => {
                branch = Some(&flag["--branch=".len()..]);
            }
            flag if VALUE_FLAGS.contains(&flag) => {
                iter.next();
            }
            flag if flag.starts_with('-') => {}
            value if url.is_none() => url = Some(value),
            // target directory; the cache decides where the clone lands
            _ => {}
        }
    }

    let url = url.ok_or_else(|| ParseError::MissingArgument {
        what: "repository url".to_string(),
    })?;
    validate_url(url)?;

    let name = repo_name(url).ok_or_else(|| ParseError::InvalidUrl {
        url: url.to_string(),
    })?;
    validate_name(name, &[])?;

    let version = match branch {
        Some(b) if is_safe_token(b, &['/']) && !b.starts_with('-') => b,
        Some(b) => {
            return Err(ParseError::InvalidVersion {
                name: name.to_string(),
                version: b.to_string(),
            })
        }
        None => LATEST,
    };

    let mut descriptor = PackageDescriptor::new(Registry::Git, name, version);
    descriptor.repository_url = Some(url.to_string());
    descriptor.branch = branch.map(str::to_string);
    Ok(descriptor)
}

/// Accept network URLs only; local paths and `file://` are refused
fn validate_url(url: &str) -> Result<(), ParseError> {
    let invalid = || ParseError::InvalidUrl {
        url: url.to_string(),
    };

    let remainder = ["https://", "http://", "ssh://", "git://"]
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .or_else(|| url.strip_prefix("git@"))
        .ok_or_else(invalid)?;

    let host = remainder
        .split(['/', ':'])
        .next()
        .filter(|h| !h.is_empty())
        .ok_or_else(invalid)?;
    let host = host.rsplit('@').next().unwrap_or(host);
    if !is_safe_token(host, &[]) || host.starts_with('-') {
        return Err(invalid());
    }
    if !is_safe_token(remainder, &['/', ':', '@', '~', '%']) {
        return Err(invalid());
    }
    Ok(())
}

fn repo_name(url: &str) -> Option<&str> {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then_some(name)
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
    use e14z_types::LATEST;

    #[test]
    fn test_https_clone() {
        let desc = parse("git clone https://github.com/acme/weather-server.git").unwrap();
        assert_eq!(desc.name, "weather-server");
        assert_eq!(desc.version, LATEST);
        assert_eq!(
            desc.repository_url.as_deref(),
            Some("https://github.com/acme/weather-server.git")
        );
        assert_eq!(desc.branch, None);
    }

    #[test]
    fn test_branch_flags() {
        let desc = parse("git clone --depth 1 -b release/v2 https://gitlab.com/x/tool").unwrap();
        assert_eq!(desc.name, "tool");
        assert_eq!(desc.branch.as_deref(), Some("release/v2"));
        assert_eq!(desc.version, "release/v2");

        let desc = parse("git clone git@github.com:acme/tool.git --branch main").unwrap();
        assert_eq!(desc.name, "tool");
        assert_eq!(desc.branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_local_and_file_urls_rejected() {
        assert!(matches!(
            parse("git clone /etc/passwd"),
            Err(ParseError::InvalidUrl { .. })
        ));
        assert!(parse("git clone file:///home/user/repo").is_err());
        assert!(parse("git clone https://-oProxyCommand=x/repo").is_err());
    }

    #[test]
    fn test_missing_url() {
        assert!(matches!(
            parse("git clone --depth 1"),
            Err(ParseError::MissingArgument { .. })
        ));
        assert!(parse("git pull").is_err());
    }
}
