//! Core data models shared by the normalizer, index, ranker, and harness.
//!
//! A [`Record`] is the atomic retrievable unit. Records are produced from
//! [`SourceItem`]s at build time and never mutated afterwards; a rebuild
//! produces a whole new set.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Closed set of record kinds. Drives the type boost table in
/// [`crate::score::ScoringConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    RepoFile,
    SupportDoc,
    CuratedDoc,
    SkillDoc,
    SourceManifest,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::RepoFile,
        RecordKind::SupportDoc,
        RecordKind::CuratedDoc,
        RecordKind::SkillDoc,
        RecordKind::SourceManifest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::RepoFile => "repo_file",
            RecordKind::SupportDoc => "support_doc",
            RecordKind::CuratedDoc => "curated_doc",
            RecordKind::SkillDoc => "skill_doc",
            RecordKind::SourceManifest => "source_manifest",
        }
    }

    /// Prefix used when deriving record ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            RecordKind::RepoFile => "repo",
            RecordKind::SupportDoc => "support",
            RecordKind::CuratedDoc => "doc",
            RecordKind::SkillDoc => "skill",
            RecordKind::SourceManifest => "source",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown record type '{}'. Expected one of: repo_file, support_doc, curated_doc, skill_doc, source_manifest",
                    s
                )
            })
    }
}

/// One retrievable unit of normalized text plus metadata.
///
/// Serialized one-per-line in `records.jsonl`. Field order here is the
/// on-disk field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable id derived from kind, path, and chunk index.
    pub id: String,
    /// Repository-relative path; empty for URL-only manifest entries.
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    #[serde(default)]
    pub title: String,
    /// Sorted and deduplicated.
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
}

impl Record {
    /// Key used for per-path deduplication at retrieval time. Path-less
    /// records are keyed by id so they never collapse into each other.
    pub fn dedup_key(&self) -> &str {
        if self.path.is_empty() {
            &self.id
        } else {
            &self.path
        }
    }
}

/// Raw input to the normalizer, as produced by an acquisition connector.
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub kind: RecordKind,
    /// Repository-relative path, `/`-separated. Empty for URL-only entries.
    pub path: String,
    pub url: Option<String>,
    /// Explicit title; overrides any derived one.
    pub title: Option<String>,
    /// Declared tags (manifest topics, connector tags).
    pub tags: Vec<String>,
    /// Undecoded body bytes.
    pub body: Vec<u8>,
}

impl SourceItem {
    pub fn text(kind: RecordKind, path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            url: None,
            title: None,
            tags: Vec::new(),
            body: body.into().into_bytes(),
        }
    }
}

/// A record paired with its relevance score for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub record: Record,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<crate::score::ScoreBreakdown>,
}

impl ScoredRecord {
    /// Ranking order: score descending, then path, then id ascending.
    pub fn cmp_rank(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.record.path.cmp(&other.record.path))
            .then_with(|| self.record.id.cmp(&other.record.id))
    }
}

/// Counts of raw items that produced no records, by cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCounts {
    #[serde(default)]
    pub binary: usize,
    #[serde(default)]
    pub not_utf8: usize,
    #[serde(default)]
    pub empty: usize,
    /// Read failures reported by the connector.
    #[serde(default)]
    pub unreadable: usize,
    /// Items dropped by the benchmark leakage guard.
    #[serde(default)]
    pub excluded: usize,
}

impl SkippedCounts {
    pub fn total(&self) -> usize {
        self.binary + self.not_utf8 + self.empty + self.unreadable + self.excluded
    }

    pub fn record(&mut self, err: crate::error::NormalizeError) {
        use crate::error::NormalizeError;
        match err {
            NormalizeError::Binary => self.binary += 1,
            NormalizeError::NotUtf8 => self.not_utf8 += 1,
            NormalizeError::Empty => self.empty += 1,
        }
    }
}

/// Summary metadata persisted next to the record stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub records: usize,
    /// Record counts keyed by [`RecordKind::as_str`].
    pub by_type: BTreeMap<String, usize>,
    #[serde(default)]
    pub skipped: SkippedCounts,
    #[serde(default)]
    pub duplicates_collapsed: usize,
    /// RFC 3339 build timestamp.
    pub built_at: String,
    /// SHA-256 over record ids and contents in index order.
    pub generation: String,
    pub max_chunk_chars: usize,
}
