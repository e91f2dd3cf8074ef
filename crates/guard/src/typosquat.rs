//! Single-edit name comparison

use crate::ReputationDb;

/// How a candidate name differs from a popular one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMethod {
    /// One extra character (`expresss`)
    Insertion,
    /// One missing character (`expres`)
    Deletion,
    /// One changed character (`exprass`)
    Substitution,
    /// Two adjacent characters swapped (`exrpess`)
    Transposition,
}

impl EditMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insertion => "insertion",
            Self::Deletion => "deletion",
            Self::Substitution => "substitution",
            Self::Transposition => "transposition",
        }
    }
}

/// The single edit that turns `target` into `candidate`, if there is one
///
/// Identical names return `None`.
#[must_use]
pub fn edit_method(candidate: &str, target: &str) -> Option<EditMethod> {
    let c: Vec<char> = candidate.chars().collect();
    let t: Vec<char> = target.chars().collect();

    match c.len().cmp(&t.len()) {
        std::cmp::Ordering::Greater if c.len() == t.len() + 1 => {
            one_removed(&c, &t).then_some(EditMethod::Insertion)
        }
        std::cmp::Ordering::Less if c.len() + 1 == t.len() => {
            one_removed(&t, &c).then_some(EditMethod::Deletion)
        }
        std::cmp::Ordering::Equal => {
            let diffs: Vec<usize> = (0..c.len()).filter(|&i| c[i] != t[i]).collect();
            match diffs.as_slice() {
                [_] => Some(EditMethod::Substitution),
                [a, b] if *b == a + 1 && c[*a] == t[*b] && c[*b] == t[*a] => {
                    Some(EditMethod::Transposition)
                }
                _ => None,
            }
        }
        _ => None,
    }
}

/// True if deleting exactly one char from `longer` yields `shorter`
fn one_removed(longer: &[char], shorter: &[char]) -> bool {
    let split = longer
        .iter()
        .zip(shorter)
        .take_while(|(a, b)| a == b)
        .count();
    longer[split + 1..] == shorter[split..]
}

/// First popular name `name` is one edit away from
///
/// Popular names themselves are never flagged, and a name in a trusted
/// scope is never compared.
#[must_use]
pub fn find_typosquat_target<'a>(
    db: &'a ReputationDb,
    full_name: &str,
    scope: Option<&str>,
) -> Option<(&'a str, EditMethod)> {
    if scope.is_some_and(|s| db.is_trusted_scope(s)) || db.is_popular(full_name) {
        return None;
    }
    let candidate = full_name.to_ascii_lowercase();
    let bare = candidate.rsplit('/').next().unwrap_or(&candidate).to_string();

    db.popular().find_map(|target| {
        // scoped targets compare full names, plain targets compare the bare name
        let subject = if target.starts_with('@') {
            candidate.as_str()
        } else {
            bare.as_str()
        };
        edit_method(subject, target).map(|method| (target, method))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_methods() {
        assert_eq!(edit_method("expresss", "express"), Some(EditMethod::Insertion));
        assert_eq!(edit_method("xexpress", "express"), Some(EditMethod::Insertion));
        assert_eq!(edit_method("expres", "express"), Some(EditMethod::Deletion));
        assert_eq!(edit_method("exprass", "express"), Some(EditMethod::Substitution));
        assert_eq!(edit_method("exrpess", "express"), Some(EditMethod::Transposition));
        assert_eq!(edit_method("express", "express"), None);
        assert_eq!(edit_method("expert", "express"), None);
    }

    #[test]
    fn test_exact_popular_not_flagged() {
        let db = ReputationDb::default();
        assert_eq!(find_typosquat_target(&db, "express", None), None);
        assert_eq!(find_typosquat_target(&db, "react-dom", None), None);
    }

    #[test]
    fn test_scoped_targets() {
        let db = ReputationDb::default();
        let hit = find_typosquat_target(&db, "@modelcontextprotocol/server-filesystm", Some("modelcontextprotocol"));
        // trusted scope bypasses the check entirely
        assert_eq!(hit, None);

        let hit = find_typosquat_target(&db, "@modelcontextprot0col/server-filesystem", Some("modelcontextprot0col"));
        assert_eq!(
            hit,
            Some(("@modelcontextprotocol/server-filesystem", EditMethod::Substitution))
        );

        let hit = find_typosquat_target(&db, "@evil/lodahs", Some("evil"));
        assert_eq!(hit, Some(("lodash", EditMethod::Transposition)));
    }

    #[test]
    fn test_short_targets_compared() {
        let db = ReputationDb::default();
        assert_eq!(find_typosquat_target(&db, "zodd", None), Some(("zod", EditMethod::Insertion)));
        assert_eq!(find_typosquat_target(&db, "zd", None), Some(("zod", EditMethod::Deletion)));
        assert_eq!(find_typosquat_target(&db, "mcpp", None), Some(("mcp", EditMethod::Insertion)));
        assert_eq!(find_typosquat_target(&db, "mc", None), Some(("mcp", EditMethod::Deletion)));
        assert_eq!(find_typosquat_target(&db, "mcq", None), Some(("mcp", EditMethod::Substitution)));
        assert_eq!(find_typosquat_target(&db, "zod", None), None);
    }

    proptest! {
        #[test]
        fn prop_single_insertion_detected(pos in 0usize..7, ch in "[a-z0-9-]") {
            let mut name: Vec<char> = "express".chars().collect();
            name.insert(pos.min(name.len()), ch.chars().next().unwrap());
            let candidate: String = name.into_iter().collect();
            prop_assert!(edit_method(&candidate, "express").is_some());
        }

        #[test]
        fn prop_single_deletion_detected(pos in 0usize..7) {
            let mut name: Vec<char> = "express".chars().collect();
            name.remove(pos);
            let candidate: String = name.into_iter().collect();
            prop_assert!(edit_method(&candidate, "express").is_some());
        }

        #[test]
        fn prop_single_substitution_detected(pos in 0usize..7, ch in "[a-z0-9-]") {
            let mut name: Vec<char> = "express".chars().collect();
            let ch = ch.chars().next().unwrap();
            prop_assume!(name[pos] != ch);
            name[pos] = ch;
            let candidate: String = name.into_iter().collect();
            prop_assert_eq!(edit_method(&candidate, "express"), Some(EditMethod::Substitution));
        }

        #[test]
        fn prop_adjacent_transposition_detected(pos in 0usize..6) {
            let mut name: Vec<char> = "express".chars().collect();
            prop_assume!(name[pos] != name[pos + 1]);
            name.swap(pos, pos + 1);
            let candidate: String = name.into_iter().collect();
            prop_assert_eq!(edit_method(&candidate, "express"), Some(EditMethod::Transposition));
        }

        #[test]
        fn prop_every_popular_name_guarded(idx in 0usize..64, ch in "[a-z0-9]") {
            let db = ReputationDb::default();
            let targets: Vec<&str> = db.popular().filter(|t| !t.starts_with('@')).collect();
            let target = targets[idx % targets.len()];
            let candidate = format!("{target}{ch}");
            prop_assume!(!db.is_popular(&candidate));
            prop_assert!(find_typosquat_target(&db, &candidate, None).is_some());
        }
    }
}
