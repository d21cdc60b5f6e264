//! Path patterns used by benchmark expectations and the leakage guard.
//!
//! | Syntax | Kind | Matches when |
//! |--------|------|--------------|
//! | `prefix:docs/` | [`PathPattern::Prefix`] | the target starts with `docs/` |
//! | `glob:**/*.md`, `docs/*.md` | [`PathPattern::Glob`] | the whole target matches the glob |
//! | `vendor/` | [`PathPattern::Substring`] | the target contains `vendor/` |
//!
//! A bare pattern containing any of `*?[{` is treated as a glob. All
//! matching is case-insensitive.

use globset::{GlobBuilder, GlobMatcher};

use crate::error::{Error, Result};
use crate::models::Record;

#[derive(Debug, Clone)]
pub enum PathPattern {
    Prefix(String),
    Substring(String),
    Glob { source: String, matcher: GlobMatcher },
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (kind, body) = if let Some(p) = trimmed.strip_prefix("prefix:") {
            ("prefix", p)
        } else if let Some(p) = trimmed.strip_prefix("glob:") {
            ("glob", p)
        } else {
            ("", trimmed)
        };
        let cleaned = clean(body);
        if cleaned.is_empty() {
            return Err(Error::Pattern {
                pattern: raw.to_string(),
                message: "pattern is empty".to_string(),
            });
        }
        match kind {
            "prefix" => Ok(PathPattern::Prefix(cleaned)),
            "glob" => glob(raw, &cleaned),
            _ if cleaned.contains(['*', '?', '[', '{']) => glob(raw, &cleaned),
            _ => Ok(PathPattern::Substring(cleaned)),
        }
    }

    /// The pattern text as written, without its kind prefix.
    pub fn as_str(&self) -> &str {
        match self {
            PathPattern::Prefix(p) | PathPattern::Substring(p) => p,
            PathPattern::Glob { source, .. } => source,
        }
    }

    pub fn matches(&self, target: &str) -> bool {
        if target.is_empty() {
            return false;
        }
        let target = target.to_lowercase();
        let target = target.strip_prefix("./").unwrap_or(&target);
        match self {
            PathPattern::Prefix(p) => target.starts_with(p.as_str()),
            PathPattern::Substring(p) => target.contains(p.as_str()),
            PathPattern::Glob { matcher, .. } => matcher.is_match(target),
        }
    }

    /// Match against a record's path, then its url.
    pub fn matches_record(&self, record: &Record) -> bool {
        self.matches(&record.path) || record.url.as_deref().is_some_and(|u| self.matches(u))
    }
}

/// Parse every pattern, collecting failures instead of stopping at the first.
pub fn parse_all(raw: &[String]) -> (Vec<PathPattern>, Vec<Error>) {
    let mut ok = Vec::new();
    let mut errors = Vec::new();
    for r in raw {
        match PathPattern::parse(r) {
            Ok(p) => ok.push(p),
            Err(e) => errors.push(e),
        }
    }
    (ok, errors)
}

fn clean(p: &str) -> String {
    let lower = p.trim().to_lowercase();
    lower.strip_prefix("./").unwrap_or(&lower).to_string()
}

fn glob(raw: &str, pattern: &str) -> Result<PathPattern> {
    let glob = GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(false)
        .build()
        .map_err(|e| Error::Pattern {
            pattern: raw.to_string(),
            message: e.to_string(),
        })?;
    Ok(PathPattern::Glob {
        source: pattern.to_string(),
        matcher: glob.compile_matcher(),
    })
}
