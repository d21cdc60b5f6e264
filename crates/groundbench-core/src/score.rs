//! Lexical relevance scoring.
//!
//! # Algorithm
//!
//! 1. Haystack = `title + tags + content`, lower-cased and tokenized.
//! 2. For each unique query token, count its occurrences in the haystack,
//!    capped at `saturation`.
//! 3. `hits` = sum of capped counts; `coverage` = `hits / n` where `n` is
//!    the number of unique query tokens.
//! 4. `type_boost` = lookup by [`RecordKind`].
//! 5. `path_weight` = first matching prefix rule, times the noise weight
//!    for vendor/third-party/generated paths and licence files, times the
//!    unverified weight for records tagged as unverified support pages.
//! 6. `base = hits + coverage * coverage_weight`, combined with the two
//!    factors per [`Combine`].
//!
//! A record with no hits scores exactly `0.0` and is excluded by the ranker.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Record, RecordKind};
use crate::tokenize::tokenize;

/// How the type boost and path weight are applied to the base score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combine {
    /// `base * type_boost * path_weight`
    #[default]
    Multiplicative,
    /// `base * max(0, 1 + (type_boost - 1) + (path_weight - 1))`
    Additive,
}

/// A path prefix and the factor applied to records under it. With
/// `exact`, the whole path must equal `prefix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathWeight {
    pub prefix: String,
    pub weight: f64,
    #[serde(default)]
    pub exact: bool,
}

impl PathWeight {
    fn new(prefix: &str, weight: f64) -> Self {
        Self {
            prefix: prefix.to_string(),
            weight,
            exact: false,
        }
    }

    fn exact(path: &str, weight: f64) -> Self {
        Self {
            exact: true,
            ..Self::new(path, weight)
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        let rule = self.prefix.to_lowercase();
        if rule.is_empty() {
            false
        } else if self.exact {
            path == rule
        } else {
            path.starts_with(&rule)
        }
    }
}

/// Scoring knobs, read from the `[scoring]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-token occurrence cap.
    pub saturation: usize,
    pub coverage_weight: f64,
    /// Keyed by [`RecordKind::as_str`]. Missing kinds get `1.0`.
    pub type_boosts: HashMap<String, f64>,
    /// Ordered; the first rule whose prefix matches wins.
    pub path_weights: Vec<PathWeight>,
    /// Substrings of `/path/` marking vendored or generated noise.
    pub noise_hints: Vec<String>,
    pub noise_weight: f64,
    /// Tag marking a support page whose content could not be verified.
    pub unverified_tag: String,
    pub unverified_weight: f64,
    pub combine: Combine,
    /// Drop stopwords from queries before scoring.
    pub stopwords: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let type_boosts = [
            (RecordKind::SupportDoc, 1.25),
            (RecordKind::CuratedDoc, 1.15),
            (RecordKind::SkillDoc, 1.10),
            (RecordKind::SourceManifest, 1.0),
            (RecordKind::RepoFile, 1.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.as_str().to_string(), v))
        .collect();

        Self {
            saturation: 6,
            coverage_weight: 5.0,
            type_boosts,
            path_weights: vec![
                PathWeight::exact("agents.md", 2.0),
                PathWeight::new("docs/verification/", 1.35),
                PathWeight::new("docs/", 1.2),
                PathWeight::new("skills/", 1.2),
            ],
            noise_hints: [
                "/thirdparty/",
                "/third-party/",
                "/third_party/",
                "/extern/",
                "/external/",
                "/vendor/",
                "/deps/",
                "/.github/",
                "/generated/",
                "/node_modules/",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            noise_weight: 0.25,
            unverified_tag: "support_unverified".to_string(),
            unverified_weight: 0.35,
            combine: Combine::Multiplicative,
            stopwords: true,
        }
    }
}

/// Scoring breakdown for one record, returned when `explain` is requested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub hits: usize,
    pub coverage: f64,
    pub type_boost: f64,
    pub path_weight: f64,
    pub score: f64,
}

/// Stateless scorer over a [`ScoringConfig`].
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Relevance of `record` for the unique `tokens`. Never negative.
    pub fn score(&self, tokens: &[String], record: &Record) -> f64 {
        self.explain(tokens, record).map(|b| b.score).unwrap_or(0.0)
    }

    /// Full breakdown, or `None` when the record does not match at all.
    pub fn explain(&self, tokens: &[String], record: &Record) -> Option<ScoreBreakdown> {
        if tokens.is_empty() {
            return None;
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        let haystack = format!("{} {} {}", record.title, record.tags.join(" "), record.content);
        for tok in tokenize(&haystack) {
            *counts.entry(tok).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return None;
        }

        let hits: usize = tokens
            .iter()
            .map(|t| counts.get(t).copied().unwrap_or(0).min(self.config.saturation))
            .sum();
        if hits == 0 {
            return None;
        }

        let coverage = hits as f64 / tokens.len() as f64;
        let type_boost = self.type_boost(record.kind);
        let path_weight = self.path_weight(record);
        let base = hits as f64 + coverage * self.config.coverage_weight;

        let score = match self.config.combine {
            Combine::Multiplicative => base * type_boost * path_weight,
            Combine::Additive => base * (1.0 + (type_boost - 1.0) + (path_weight - 1.0)).max(0.0),
        };

        Some(ScoreBreakdown {
            hits,
            coverage,
            type_boost,
            path_weight,
            score: score.max(0.0),
        })
    }

    pub fn type_boost(&self, kind: RecordKind) -> f64 {
        self.config
            .type_boosts
            .get(kind.as_str())
            .copied()
            .unwrap_or(1.0)
    }

    /// Combined path factor: prefix rule, noise penalty, unverified penalty.
    pub fn path_weight(&self, record: &Record) -> f64 {
        let path = record.path.to_lowercase();
        let mut weight = self
            .config
            .path_weights
            .iter()
            .find(|rule| rule.applies_to(&path))
            .map(|rule| rule.weight)
            .unwrap_or(1.0);

        if self.is_noise(&path) {
            weight *= self.config.noise_weight;
        }
        if !self.config.unverified_tag.is_empty()
            && record.tags.iter().any(|t| t == &self.config.unverified_tag)
        {
            weight *= self.config.unverified_weight;
        }
        weight
    }

    fn is_noise(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let wrapped = format!("/{}/", path.trim_matches('/'));
        if self
            .config
            .noise_hints
            .iter()
            .any(|hint| wrapped.contains(hint.as_str()))
        {
            return true;
        }
        let name = path.rsplit('/').next().unwrap_or(path);
        matches!(name, "license" | "license.txt" | "license.md" | "copying")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(kind: RecordKind, path: &str, content: &str) -> Record {
        Record {
            id: format!("{}:{}", kind.id_prefix(), path),
            path: path.to_string(),
            url: None,
            kind,
            title: String::new(),
            tags: Vec::new(),
            content: content.to_string(),
        }
    }

    fn toks(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| t.to_string()).collect()
    }

    fn neutral() -> Scorer {
        Scorer::new(ScoringConfig {
            path_weights: Vec::new(),
            ..ScoringConfig::default()
        })
    }

    #[test]
    fn two_tokens_present_once_each() {
        let r = rec(RecordKind::RepoFile, "src/a.md", "dds service interface for g1");
        let b = neutral().explain(&toks(&["dds", "interface"]), &r).unwrap();
        assert_eq!(b.hits, 2);
        assert!((b.coverage - 1.0).abs() < 1e-9);
        assert!((b.score - 7.0).abs() < 1e-9);
    }

    #[test]
    fn type_boost_scales_score() {
        let s = neutral();
        let t = toks(&["dds"]);
        let plain = s.score(&t, &rec(RecordKind::RepoFile, "a", "dds"));
        let support = s.score(&t, &rec(RecordKind::SupportDoc, "a", "dds"));
        assert!((support / plain - 1.25).abs() < 1e-9);
    }

    #[test]
    fn repeated_term_saturates() {
        let s = neutral();
        let t = toks(&["dds"]);
        let six = s.score(&t, &rec(RecordKind::RepoFile, "a", &"dds ".repeat(6)));
        let twenty = s.score(&t, &rec(RecordKind::RepoFile, "a", &"dds ".repeat(20)));
        assert_eq!(six, twenty);
        let b = s.explain(&t, &rec(RecordKind::RepoFile, "a", &"dds ".repeat(20))).unwrap();
        assert_eq!(b.hits, 6);
        assert!(b.coverage > 1.0);
    }

    #[test]
    fn no_hits_or_empty_haystack_scores_zero() {
        let s = Scorer::default();
        assert_eq!(s.score(&toks(&["zzz"]), &rec(RecordKind::RepoFile, "a", "dds")), 0.0);
        assert_eq!(s.score(&toks(&["dds"]), &rec(RecordKind::RepoFile, "a", "")), 0.0);
        assert_eq!(s.score(&[], &rec(RecordKind::RepoFile, "a", "dds")), 0.0);
    }

    #[test]
    fn title_and_tags_are_part_of_haystack() {
        let mut r = rec(RecordKind::RepoFile, "a", "nothing here");
        r.title = "Locomotion".into();
        r.tags = vec!["sim2real".into()];
        let b = neutral().explain(&toks(&["locomotion", "sim2real"]), &r).unwrap();
        assert_eq!(b.hits, 2);
    }

    #[test]
    fn vendor_paths_are_penalised() {
        let s = Scorer::default();
        let t = toks(&["dds"]);
        let clean = s.score(&t, &rec(RecordKind::RepoFile, "data/repos/sdk/src/a.cpp", "dds"));
        let vendored = s.score(&t, &rec(RecordKind::RepoFile, "data/repos/sdk/thirdparty/a.cpp", "dds"));
        let license = s.score(&t, &rec(RecordKind::RepoFile, "data/repos/sdk/LICENSE", "dds"));
        assert!((vendored / clean - 0.25).abs() < 1e-9);
        assert!((license / clean - 0.25).abs() < 1e-9);
    }

    #[test]
    fn first_matching_prefix_wins() {
        let s = Scorer::default();
        let verification = rec(RecordKind::CuratedDoc, "docs/verification/x.md", "x");
        let docs = rec(RecordKind::CuratedDoc, "docs/x.md", "x");
        assert!((s.path_weight(&verification) - 1.35).abs() < 1e-9);
        assert!((s.path_weight(&docs) - 1.2).abs() < 1e-9);
        assert!((s.path_weight(&rec(RecordKind::RepoFile, "AGENTS.md", "x")) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn agents_md_rule_is_exact() {
        let s = Scorer::default();
        for path in ["agents.md.bak", "agents.mdx", "docs_old/agents.md"] {
            let w = s.path_weight(&rec(RecordKind::RepoFile, path, "x"));
            assert!((w - 1.0).abs() < 1e-9, "{} got {}", path, w);
        }
    }

    #[test]
    fn unverified_support_pages_are_penalised() {
        let s = neutral();
        let mut r = rec(RecordKind::SupportDoc, "data/support/a.html", "dds");
        let before = s.score(&toks(&["dds"]), &r);
        r.tags.push("support_unverified".into());
        let after = s.score(&toks(&["dds"]), &r);
        assert!((after / before - 0.35).abs() < 1e-9);
    }

    #[test]
    fn additive_combination() {
        let s = Scorer::new(ScoringConfig {
            combine: Combine::Additive,
            ..ScoringConfig::default()
        });
        // base 7, type 1.15, path 1.2 -> 7 * 1.35
        let r = rec(RecordKind::CuratedDoc, "docs/a.md", "dds interface");
        let b = s.explain(&toks(&["dds", "interface"]), &r).unwrap();
        assert!((b.score - 7.0 * 1.35).abs() < 1e-9);
    }

    #[test]
    fn config_deserializes_partially() {
        let cfg: ScoringConfig = serde_json::from_str(r#"{"saturation": 3, "combine": "additive"}"#).unwrap();
        assert_eq!(cfg.saturation, 3);
        assert_eq!(cfg.combine, Combine::Additive);
        assert!((cfg.coverage_weight - 5.0).abs() < 1e-9);
    }
}
