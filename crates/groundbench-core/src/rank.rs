//! Retrieval: score every record, rank, dedup by path, truncate.
//!
//! The ranking pass operates on an already-built [`Index`] and a
//! [`Scorer`]; it has no I/O and holds no mutable shared state, so the
//! scoring loop runs on rayon when the `parallel` feature is enabled.
//!
//! # Ranking
//!
//! 1. Tokenize the query; no tokens means an empty [`SearchStatus::NoTokens`]
//!    response, not an error.
//! 2. Score every record (optionally filtered by kind); drop scores `<= 0`.
//! 3. Sort by score (desc), path (asc), id (asc).
//! 4. Keep only the first record per path so one document's chunks cannot
//!    fill the whole list.
//! 5. Truncate to `top_k`.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;

use crate::index::Index;
use crate::models::{Record, RecordKind, ScoredRecord};
use crate::score::Scorer;
use crate::tokenize::query_tokens;

/// Default number of results per query.
pub const DEFAULT_TOP_K: usize = 8;

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    pub text: &'a str,
    pub top_k: usize,
    /// Only consider records of these kinds. Empty means all.
    pub kinds: &'a [RecordKind],
    /// Populate per-result score breakdowns.
    pub explain: bool,
}

impl<'a> Query<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            top_k: DEFAULT_TOP_K,
            kinds: &[],
            explain: false,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Ok,
    /// The query contained no recognizable tokens.
    NoTokens,
}

/// Ranked results for one query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub tokens: Vec<String>,
    pub top_k: usize,
    pub status: SearchStatus,
    pub results: Vec<ScoredRecord>,
}

/// Run a query against an index.
pub fn search(index: &Index, scorer: &Scorer, query: &Query<'_>) -> SearchResponse {
    let tokens = query_tokens(query.text, scorer.config().stopwords);
    if tokens.is_empty() {
        return SearchResponse {
            query: query.text.to_string(),
            tokens,
            top_k: query.top_k,
            status: SearchStatus::NoTokens,
            results: Vec::new(),
        };
    }

    let mut scored = score_all(index.records(), scorer, &tokens, query);
    scored.sort_by(|a, b| a.cmp_rank(b));
    let results = dedup_by_path(scored, query.top_k);

    tracing::debug!(
        query = query.text,
        tokens = tokens.len(),
        results = results.len(),
        "search complete"
    );

    SearchResponse {
        query: query.text.to_string(),
        tokens,
        top_k: query.top_k,
        status: SearchStatus::Ok,
        results,
    }
}

fn score_one(scorer: &Scorer, tokens: &[String], query: &Query<'_>, record: &Record) -> Option<ScoredRecord> {
    if !query.kinds.is_empty() && !query.kinds.contains(&record.kind) {
        return None;
    }
    let breakdown = scorer.explain(tokens, record)?;
    if breakdown.score <= 0.0 {
        return None;
    }
    Some(ScoredRecord {
        record: record.clone(),
        score: breakdown.score,
        explain: query.explain.then_some(breakdown),
    })
}

#[cfg(feature = "parallel")]
fn score_all(records: &[Record], scorer: &Scorer, tokens: &[String], query: &Query<'_>) -> Vec<ScoredRecord> {
    records
        .par_iter()
        .filter_map(|r| score_one(scorer, tokens, query, r))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn score_all(records: &[Record], scorer: &Scorer, tokens: &[String], query: &Query<'_>) -> Vec<ScoredRecord> {
    records
        .iter()
        .filter_map(|r| score_one(scorer, tokens, query, r))
        .collect()
}

/// Keep the best record per [`Record::dedup_key`] from an already ranked
/// list, stopping at `top_k`.
pub fn dedup_by_path(ranked: Vec<ScoredRecord>, top_k: usize) -> Vec<ScoredRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(top_k.min(ranked.len()));
    for item in ranked {
        if out.len() >= top_k {
            break;
        }
        if seen.insert(item.record.dedup_key().to_string()) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;
    use crate::models::SourceItem;
    use crate::normalize::ChunkingParams;
    use crate::score::ScoringConfig;

    fn record(id: &str, path: &str, kind: RecordKind, content: &str) -> Record {
        Record {
            id: id.to_string(),
            path: path.to_string(),
            url: None,
            kind,
            title: String::new(),
            tags: Vec::new(),
            content: content.to_string(),
        }
    }

    fn index_of(records: Vec<Record>) -> Index {
        let meta = crate::index::summarize(
            &records,
            Default::default(),
            0,
            ChunkingParams::default(),
        );
        Index::from_parts(records, meta).unwrap()
    }

    fn neutral() -> Scorer {
        Scorer::new(ScoringConfig {
            path_weights: Vec::new(),
            ..ScoringConfig::default()
        })
    }

    #[test]
    fn matching_record_appears_with_expected_score() {
        let index = index_of(vec![
            record("doc:docs/a.md", "docs/a.md", RecordKind::CuratedDoc, "dds service interface for g1"),
            record("repo:x", "x.cpp", RecordKind::RepoFile, "unrelated"),
        ]);
        let resp = search(&index, &neutral(), &Query::new("dds interface"));
        assert_eq!(resp.status, SearchStatus::Ok);
        assert_eq!(resp.tokens, vec!["dds", "interface"]);
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].record.path, "docs/a.md");
        assert!((resp.results[0].score - 7.0 * 1.15).abs() < 1e-9);
    }

    #[test]
    fn only_best_chunk_per_path_is_kept() {
        let index = index_of(vec![
            record("doc:docs/b.md:chunk-0000", "docs/b.md", RecordKind::CuratedDoc, "dds"),
            record("doc:docs/b.md:chunk-0001", "docs/b.md", RecordKind::CuratedDoc, "dds dds interface"),
            record("doc:docs/c.md", "docs/c.md", RecordKind::CuratedDoc, "dds"),
        ]);
        let resp = search(&index, &neutral(), &Query::new("dds interface"));
        let ids: Vec<&str> = resp.results.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["doc:docs/b.md:chunk-0001", "doc:docs/c.md"]);
    }

    #[test]
    fn punctuation_query_is_empty_not_error() {
        let index = index_of(vec![record("a", "a", RecordKind::RepoFile, "dds")]);
        let resp = search(&index, &Scorer::default(), &Query::new("?!... ---"));
        assert_eq!(resp.status, SearchStatus::NoTokens);
        assert!(resp.results.is_empty());
    }

    #[test]
    fn ties_break_on_path_then_id() {
        let index = index_of(vec![
            record("r:2", "b.md", RecordKind::RepoFile, "dds"),
            record("r:1", "a.md", RecordKind::RepoFile, "dds"),
        ]);
        let resp = search(&index, &neutral(), &Query::new("dds"));
        assert_eq!(resp.results[0].record.path, "a.md");
        assert_eq!(resp.results[1].record.path, "b.md");
    }

    #[test]
    fn top_k_truncates_after_dedup() {
        let records = (0..20)
            .map(|i| record(&format!("r:{}", i), &format!("f{:02}.md", i), RecordKind::RepoFile, "dds"))
            .collect();
        let index = index_of(records);
        let resp = search(&index, &neutral(), &Query::new("dds").top_k(5));
        assert_eq!(resp.results.len(), 5);
    }

    #[test]
    fn kind_filter_and_explain() {
        let index = index_of(vec![
            record("a", "a.md", RecordKind::RepoFile, "dds"),
            record("b", "b.md", RecordKind::SupportDoc, "dds"),
        ]);
        let kinds = [RecordKind::SupportDoc];
        let q = Query {
            kinds: &kinds,
            explain: true,
            ..Query::new("dds")
        };
        let resp = search(&index, &neutral(), &q);
        assert_eq!(resp.results.len(), 1);
        let explain = resp.results[0].explain.unwrap();
        assert_eq!(explain.hits, 1);
        assert!((explain.type_boost - 1.25).abs() < 1e-9);
    }

    #[test]
    fn built_index_ranks_deterministically() {
        let items = vec![
            SourceItem::text(RecordKind::CuratedDoc, "docs/dds.md", "# DDS\n\nThe dds interface."),
            SourceItem::text(RecordKind::RepoFile, "sdk/dds.cpp", "dds interface impl"),
        ];
        let a = IndexBuilder::default().build(items.clone());
        let b = IndexBuilder::default().build(items);
        let q = Query::new("dds interface");
        let ra: Vec<String> = search(&a, &Scorer::default(), &q).results.into_iter().map(|r| r.record.id).collect();
        let rb: Vec<String> = search(&b, &Scorer::default(), &q).results.into_iter().map(|r| r.record.id).collect();
        assert_eq!(ra, rb);
        assert_eq!(ra.len(), 2);
    }
}
