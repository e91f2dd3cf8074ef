//! Mapping cache keys to directory names

use e14z_hash::Hash;

const HASH_SUFFIX_LEN: usize = 12;

/// `<safe-name>@<safe-version>-<short hash>`
///
/// Sanitising alone can collide (`@a/b` and `_a_b`), so the hash of the
/// raw key is appended.
pub(crate) fn dir_name(name: &str, version: &str) -> String {
    let digest = Hash::from_parts(&[name.as_bytes(), version.as_bytes()]);
    format!(
        "{}@{}-{}",
        safe_component(name),
        safe_component(version),
        digest.short_hex(HASH_SUFFIX_LEN)
    )
}

/// Key used for locks and leases
pub(crate) fn lock_key(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}

fn safe_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_names_are_flattened() {
        let dir = dir_name("@modelcontextprotocol/server-time", "1.0.0");
        assert!(dir.starts_with("_modelcontextprotocol_server-time@1.0.0-"));
        assert!(!dir.contains('/'));
    }

    #[test]
    fn test_sanitised_collisions_stay_distinct() {
        assert_ne!(dir_name("@a/b", "1"), dir_name("_a_b", "1"));
        assert_ne!(dir_name("a", "1"), dir_name("a", "2"));
    }

    #[test]
    fn test_dot_segments_neutralised() {
        let dir = dir_name("..", "..");
        assert!(!dir.starts_with('.'));
        assert!(!dir.contains('/'));
    }
}
