//! Cache key derivation and pattern matching.

use crate::types::CacheClass;
use quill_common::{QuillError, Result};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Identifiers longer than this collapse to a SHA-256 hex digest.
pub const MAX_IDENTIFIER_LEN: usize = 100;

/// Build the namespaced key for `identifier` in `class`.
pub fn make_key(class: CacheClass, identifier: &str) -> String {
    if identifier.chars().count() > MAX_IDENTIFIER_LEN {
        format!("{}{:x}", class.prefix(), Sha256::digest(identifier.as_bytes()))
    } else {
        format!("{}{}", class.prefix(), identifier)
    }
}

/// Compile a glob over identifiers of `class` into an anchored key regex.
///
/// `*` matches any run of characters and `?` a single character; everything
/// else is literal.
pub fn pattern_regex(class: CacheClass, glob: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 16);
    pattern.push('^');
    pattern.push_str(&regex::escape(class.prefix()));
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| QuillError::Config(format!("invalid cache pattern {glob:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_identifiers_keep_their_text() {
        assert_eq!(
            make_key(CacheClass::TrendingTopics, "2026-10-18"),
            "trends:2026-10-18"
        );
    }

    #[test]
    fn long_identifiers_are_hashed() {
        let long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        let key = make_key(CacheClass::SearchResults, &long);
        assert!(key.starts_with("search:"));
        assert_eq!(key.len(), "search:".len() + 64);
        assert_eq!(key, make_key(CacheClass::SearchResults, &long));

        let exact = "y".repeat(MAX_IDENTIFIER_LEN);
        assert_eq!(make_key(CacheClass::General, &exact), format!("general:{exact}"));
    }

    #[test]
    fn glob_matches_within_class_only() {
        let re = pattern_regex(CacheClass::SearchResults, "finance*").unwrap();
        assert!(re.is_match("search:finance_bitcoin"));
        assert!(!re.is_match("trends:finance_bitcoin"));
        assert!(!re.is_match("search:crypto_finance"));

        let all = pattern_regex(CacheClass::GeneratedContent, "*").unwrap();
        assert!(all.is_match("ai:content:anything"));
    }

    #[test]
    fn glob_escapes_regex_metacharacters() {
        let re = pattern_regex(CacheClass::General, "a.b?").unwrap();
        assert!(re.is_match("general:a.bc"));
        assert!(!re.is_match("general:axbc"));
    }
}
