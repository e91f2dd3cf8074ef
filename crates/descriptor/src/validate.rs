//! Name and version validation shared by the parsers

use e14z_errors::ParseError;

const MAX_NAME_LEN: usize = 214;

/// True if every character is in `[A-Za-z0-9._-]` plus `extra`
#[must_use]
pub fn is_safe_token(value: &str, extra: &[char]) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') || extra.contains(&c))
}

/// Validate a package name; `extra` widens the allowed set (docker allows `/`)
///
/// # Errors
///
/// Returns [`ParseError::InvalidName`] describing the first problem found.
pub fn validate_name(name: &str, extra: &[char]) -> Result<(), ParseError> {
    let fail = |reason: &str| {
        Err(ParseError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return fail("name is empty");
    }
    if name.len() > MAX_NAME_LEN {
        return fail("name is too long");
    }
    if name.starts_with('.') || name.starts_with('-') {
        return fail("name may not start with '.' or '-'");
    }
    if name.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return fail("name has an empty or parent path segment");
    }
    if !is_safe_token(name, extra) {
        return fail("name contains disallowed characters");
    }
    Ok(())
}

/// Validate a version or tag string
///
/// Semver ranges (`^1.2.0`, `~1.2`) and pre-release suffixes are accepted;
/// comparison operators and shell metacharacters are not.
///
/// # Errors
///
/// Returns [`ParseError::InvalidVersion`].
pub fn validate_version(name: &str, version: &str) -> Result<(), ParseError> {
    if version.len() <= 128 && !version.starts_with('-') && is_safe_token(version, &['+', '^', '~', '*']) {
        Ok(())
    } else {
        Err(ParseError::InvalidVersion {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}
