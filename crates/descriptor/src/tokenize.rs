//! Whitespace tokenizer with literal quoting
//!
//! Single and double quotes group words; nothing is expanded or escaped.

use e14z_errors::ParseError;

/// Split a command line into argv-style tokens
///
/// # Errors
///
/// Returns [`ParseError::UnknownGrammar`] on an unterminated quote.
pub fn tokenize(raw: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '\'' || ch == '"' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnknownGrammar {
            command: raw.to_string(),
        });
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_split() {
        assert_eq!(
            tokenize("  npx   -y  pkg ").unwrap(),
            vec!["npx", "-y", "pkg"]
        );
    }

    #[test]
    fn test_quotes_group_words() {
        assert_eq!(
            tokenize(r#"npx pkg "/tmp/my dir" 'a b'"#).unwrap(),
            vec!["npx", "pkg", "/tmp/my dir", "a b"]
        );
        assert_eq!(tokenize(r#"npx pkg """#).unwrap(), vec!["npx", "pkg", ""]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(tokenize("npx 'pkg").is_err());
    }
}
