//! `docker run [flags] <image>[:tag] [args...]`

use crate::validate::{is_safe_token, validate_name, validate_version};
use e14z_errors::ParseError;
use e14z_types::{PackageDescriptor, Registry, LATEST};

/// `docker run` options that consume the following token
const VALUE_FLAGS: &[&str] = &[
    "-e", "--env", "--env-file", "-v", "--volume", "-p", "--publish", "--name", "--network",
    "-w", "--workdir", "--entrypoint", "-u", "--user", "--mount", "--platform", "-m",
    "--memory", "-l", "--label", "--cpus", "--pull", "--add-host", "-h", "--hostname",
];

pub(crate) fn parse_docker(args: &[String], raw: &str) -> Result<PackageDescriptor, ParseError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(unknown(raw));
    };
    if sub != "run" {
        return Err(unknown(raw));
    }

    let mut idx = 0;
    while idx < rest.len() {
        let arg = rest[idx].as_str();
        if VALUE_FLAGS.contains(&arg) {
            idx += 2;
        } else if arg.starts_with('-') {
            idx += 1;
        } else {
            break;
        }
    }

    let image = rest.get(idx).ok_or_else(|| ParseError::MissingArgument {
        what: "docker image".to_string(),
    })?;
    let (name, version) = split_image(image);
    validate_name(name, &['/', ':'])?;
    match version.split_once(':') {
        Some((algorithm, digest)) => {
            if !is_safe_token(algorithm, &[]) || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ParseError::InvalidVersion {
                    name: name.to_string(),
                    version: version.to_string(),
                });
            }
        }
        None => validate_version(name, version)?,
    }

    let mut descriptor = PackageDescriptor::new(Registry::Docker, name, version);
    descriptor.extra_args = rest[idx + 1..].to_vec();
    Ok(descriptor)
}

/// Split `registry:5000/org/image:tag` into name and tag; a digest
/// (`image@sha256:...`) becomes the version
fn split_image(image: &str) -> (&str, &str) {
    if let Some((name, digest)) = image.split_once('@') {
        return (name, digest);
    }
    match image.rfind(':') {
        Some(idx) if !image[idx + 1..].contains('/') => (&image[..idx], &image[idx + 1..]),
        _ => (image, LATEST),
    }
}

fn unknown(raw: &str) -> ParseError {
    ParseError::UnknownGrammar {
        command: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::split_image;
    use crate::parse;
    use e14z_types::LATEST;

    #[test]
    fn test_image_and_tag() {
        let desc = parse("docker run -i --rm -e GITHUB_TOKEN ghcr.io/github/github-mcp-server:v1.2")
            .unwrap();
        assert_eq!(desc.name, "ghcr.io/github/github-mcp-server");
        assert_eq!(desc.version, "v1.2");

        let desc = parse("docker run -i mcp/time").unwrap();
        assert_eq!(desc.name, "mcp/time");
        assert_eq!(desc.version, LATEST);
    }

    #[test]
    fn test_registry_port_is_not_a_tag() {
        assert_eq!(split_image("localhost:5000/tool"), ("localhost:5000/tool", LATEST));
        assert_eq!(split_image("localhost:5000/tool:1"), ("localhost:5000/tool", "1"));
        assert_eq!(split_image("img@sha256:abc"), ("img", "sha256:abc"));
    }

    #[test]
    fn test_trailing_args_kept() {
        let desc = parse("docker run -i mcp/fetch --ignore-robots-txt").unwrap();
        assert_eq!(desc.extra_args, vec!["--ignore-robots-txt"]);
    }

    #[test]
    fn test_rejects() {
        assert!(parse("docker run -i").is_err());
        assert!(parse("docker exec box sh").is_err());
        assert!(parse("docker run 'img;id'").is_err());
        assert!(parse("docker run img@sha256:zz").is_err());
        assert_eq!(parse("docker run img@sha256:ab12").unwrap().version, "sha256:ab12");
    }
}
