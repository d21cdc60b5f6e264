//! Lexical tokenization shared by the scorer, tag derivation, and queries.
//!
//! A token is a maximal run of ASCII alphanumerics or `_`, lower-cased.
//! Everything else separates tokens, so `dds::Interface-v2` yields
//! `["dds", "interface", "v2"]`.

use std::collections::HashSet;

/// Words carrying no retrieval signal in English questions.
pub const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "for", "from", "how", "i", "in", "is",
    "it", "of", "on", "or", "our", "should", "that", "the", "this", "to", "use", "we", "what",
    "where", "which", "with",
];

/// Split `text` into lower-cased tokens, preserving order and repeats.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            current.push(c.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Whether `token` is in [`STOPWORDS`].
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Derive the unique query token set, in first-seen order.
///
/// With `drop_stopwords`, single-character tokens and stopwords are
/// removed. If that leaves nothing, multi-character tokens are kept, and
/// failing that the raw tokens, so a query made only of stopwords still
/// searches for something. Input without any token yields an empty set.
pub fn query_tokens(text: &str, drop_stopwords: bool) -> Vec<String> {
    let raw = unique(tokenize(text));
    if raw.is_empty() || !drop_stopwords {
        return raw;
    }

    let filtered: Vec<String> = raw
        .iter()
        .filter(|t| t.len() > 1 && !is_stopword(t))
        .cloned()
        .collect();
    if !filtered.is_empty() {
        return filtered;
    }

    let multi_char: Vec<String> = raw.iter().filter(|t| t.len() > 1).cloned().collect();
    if !multi_char.is_empty() {
        return multi_char;
    }
    raw
}

fn unique(tokens: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}
