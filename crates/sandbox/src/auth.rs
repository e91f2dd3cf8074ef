//! Spotting credentials a server refused to start without

use regex::Regex;

const MAX_VARS: usize = 5;

/// Words a variable name must contain to count as a credential
const PHRASE_KEYWORDS: &[&str] = &["KEY", "TOKEN", "SECRET", "AUTH", "API", "URL", "CLIENT"];
const FALLBACK_KEYWORDS: &[&str] = &["KEY", "TOKEN", "SECRET", "AUTH", "API"];

/// Error phrasings that name a missing variable, captured as `var`
const PHRASES: &[&str] = &[
    r"(?i:missing required environment variable)[:\s]+(?P<var>[A-Za-z][A-Za-z0-9_]{3,})",
    r"(?i:environment variable)\s+(?P<var>[A-Za-z][A-Za-z0-9_]{3,})\s+(?i:is required)",
    r"(?i:please set)\s+(?P<var>[A-Za-z][A-Za-z0-9_]{3,})",
    r"(?i:set the)\s+(?P<var>[A-Za-z][A-Za-z0-9_]{3,})\s+(?i:environment variable)",
    r"(?P<var>[A-Za-z][A-Za-z0-9_]{3,})\s+(?i:not found)",
    r"(?P<var>[A-Za-z][A-Za-z0-9_]{3,})\s+(?i:is not set)",
    r"(?i:missing)\s+(?P<var>[A-Za-z][A-Za-z0-9_]{3,})",
    r"(?i:requires?)\s+(?P<var>[A-Za-z][A-Za-z0-9_]{3,})",
];

/// Bare upper-case identifiers, used when no phrase matched
const FALLBACK: &str = r"\b[A-Z][A-Z0-9_]{4,}\b";

/// Environment variable names a failed server output asks for
///
/// Names are upper-cased, deduplicated in order of appearance and capped
/// at five. Only credential-looking names are kept, so ordinary words
/// caught by the looser phrasings fall away.
#[must_use]
pub fn detect_auth_env_vars(output: &str) -> Vec<String> {
    let mut found = Vec::new();
    for pattern in PHRASES {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        for caps in re.captures_iter(output) {
            if let Some(var) = caps.name("var") {
                push_candidate(&mut found, var.as_str(), PHRASE_KEYWORDS);
            }
        }
    }

    if found.is_empty() {
        if let Ok(re) = Regex::new(FALLBACK) {
            for m in re.find_iter(output) {
                push_candidate(&mut found, m.as_str(), FALLBACK_KEYWORDS);
            }
        }
    }

    found.truncate(MAX_VARS);
    found
}

fn push_candidate(found: &mut Vec<String>, raw: &str, keywords: &[&str]) {
    let name = raw.to_ascii_uppercase();
    if keywords.iter().any(|k| name.contains(k)) && !found.contains(&name) {
        found.push(name);
    }
}
