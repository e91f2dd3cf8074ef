//! Command and argument allow-listing

use e14z_config::SecurityConfig;
use e14z_errors::SecurityError;
use std::collections::{BTreeMap, BTreeSet};

/// Characters that are never allowed in an argument
const FORBIDDEN_CHARS: &[char] = &[';', '&', '|', '<', '>', '$', '`', '\\', '\n', '\r', '\0'];

/// Multi-character injection sequences, reported by name
const INJECTION_PATTERNS: &[&str] = &["$(", "&&", "||", ">>", "`"];

/// Validates programs against an allow-list and arguments against a
/// metacharacter deny-list
///
/// Nothing is ever stripped or rewritten: a value either passes unchanged
/// or the whole call fails.
#[derive(Debug, Clone)]
pub struct CommandSanitizer {
    allowed: BTreeSet<String>,
}

impl CommandSanitizer {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.allowed_commands.iter().cloned())
    }

    /// Validate a program name against the allow-list
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::UnsafeCommand`] for names outside
    /// `[A-Za-z0-9._-]` and [`SecurityError::CommandNotAllowed`] for names
    /// not on the list.
    pub fn sanitize_command(&self, command: &str) -> Result<String, SecurityError> {
        self.sanitize_command_for(command, None)
    }

    /// Like [`sanitize_command`](Self::sanitize_command), additionally
    /// allowing the package's own binary for this call only
    ///
    /// # Errors
    ///
    /// See [`sanitize_command`](Self::sanitize_command).
    pub fn sanitize_command_for(
        &self,
        command: &str,
        package_bin: Option<&str>,
    ) -> Result<String, SecurityError> {
        if !is_plain_program(command) {
            return Err(SecurityError::UnsafeCommand {
                command: command.to_string(),
            });
        }
        if self.allowed.contains(command) || package_bin == Some(command) {
            Ok(command.to_string())
        } else {
            Err(SecurityError::CommandNotAllowed {
                command: command.to_string(),
            })
        }
    }

    /// Validate every argument
    ///
    /// # Errors
    ///
    /// See [`sanitize_args`].
    pub fn sanitize_args(&self, args: &[String]) -> Result<Vec<String>, SecurityError> {
        sanitize_args(args)
    }

    /// Validate environment variable names and values
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::EnvNotAllowed`] for names that are not
    /// `[A-Za-z_][A-Za-z0-9_]*` or values containing NUL.
    pub fn sanitize_env(&self, env: &BTreeMap<String, String>) -> Result<(), SecurityError> {
        for (name, value) in env {
            let mut chars = name.chars();
            let valid_name = chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid_name || value.contains('\0') {
                return Err(SecurityError::EnvNotAllowed { name: name.clone() });
            }
        }
        Ok(())
    }
}

/// Validate every argument; any violation rejects the whole list
///
/// # Errors
///
/// Returns [`SecurityError::UnsafeArgument`] naming the first offending
/// position.
pub fn sanitize_args(args: &[String]) -> Result<Vec<String>, SecurityError> {
    for (index, arg) in args.iter().enumerate() {
        if let Some(pattern) = INJECTION_PATTERNS.iter().find(|p| arg.contains(*p)) {
            return Err(SecurityError::UnsafeArgument {
                index,
                reason: format!("contains injection sequence {pattern:?}"),
            });
        }
        if let Some(ch) = arg.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(SecurityError::UnsafeArgument {
                index,
                reason: format!("contains shell metacharacter {ch:?}"),
            });
        }
    }
    Ok(args.to_vec())
}

fn is_plain_program(command: &str) -> bool {
    !command.is_empty()
        && command != "."
        && command != ".."
        && !command.starts_with('-')
        && command
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> CommandSanitizer {
        CommandSanitizer::from_config(&SecurityConfig::default())
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_allowed_commands() {
        let s = sanitizer();
        assert_eq!(s.sanitize_command("node").unwrap(), "node");
        assert_eq!(s.sanitize_command("npx").unwrap(), "npx");
    }

    #[test]
    fn test_injected_command_rejected() {
        let s = sanitizer();
        assert!(matches!(
            s.sanitize_command("node; rm -rf /"),
            Err(SecurityError::UnsafeCommand { .. })
        ));
        assert!(matches!(
            s.sanitize_command("/bin/sh"),
            Err(SecurityError::UnsafeCommand { .. })
        ));
        assert!(matches!(
            s.sanitize_command("bash"),
            Err(SecurityError::CommandNotAllowed { .. })
        ));
    }

    #[test]
    fn test_package_bin_allowed_per_call() {
        let s = sanitizer();
        assert!(s.sanitize_command("mcp-server-time").is_err());
        assert!(s
            .sanitize_command_for("mcp-server-time", Some("mcp-server-time"))
            .is_ok());
        // the allowance does not stick
        assert!(s.sanitize_command("mcp-server-time").is_err());
    }

    #[test]
    fn test_args() {
        let ok = args(&["-y", "@scope/pkg@1.0.0", "/tmp/dir", "--flag=value"]);
        assert_eq!(sanitize_args(&ok).unwrap(), ok);

        for bad in ["a;b", "a&b", "a|b", "<x", "x>", "$HOME", "`id`", "a\\b", "a\nb", "a\0b"] {
            let err = sanitize_args(&args(&["fine", bad])).unwrap_err();
            assert!(
                matches!(err, SecurityError::UnsafeArgument { index: 1, .. }),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_injection_reason_named() {
        let err = sanitize_args(&args(&["$(whoami)"])).unwrap_err();
        assert!(err.to_string().contains("$("));
        let err = sanitize_args(&args(&["a&&b"])).unwrap_err();
        assert!(err.to_string().contains("&&"));
    }

    #[test]
    fn test_env_names() {
        let s = sanitizer();
        let mut env = BTreeMap::new();
        env.insert("GITHUB_TOKEN".to_string(), "abc".to_string());
        assert!(s.sanitize_env(&env).is_ok());
        env.insert("BAD-NAME".to_string(), "x".to_string());
        assert!(s.sanitize_env(&env).is_err());
    }
}
