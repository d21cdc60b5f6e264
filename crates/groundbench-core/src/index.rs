//! Index builder and the immutable in-memory index.
//!
//! # Build
//!
//! 1. Drop items excluded by the leakage guard (counted as `excluded`).
//! 2. Sort remaining items by `(kind, path, url, body)` so output does not
//!    depend on scan order.
//! 3. Normalize each item; failures are counted per cause, never fatal.
//! 4. Collapse records with identical `(path, content hash)`.
//! 5. Disambiguate any id collision with a `~N` suffix.
//!
//! An [`Index`] is never mutated after build. [`IndexHandle`] swaps whole
//! generations so readers always see one consistent index.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

use crate::bench::BenchmarkSuite;
use crate::chunk::content_hash;
use crate::error::{Error, Result};
use crate::models::{IndexMeta, Record, SkippedCounts, SourceItem};
use crate::normalize::{ChunkingParams, Normalizer};
use crate::pattern::PathPattern;

/// A fully built, read-only record collection plus its metadata.
#[derive(Debug, Clone)]
pub struct Index {
    records: Vec<Record>,
    meta: IndexMeta,
}

impl Index {
    /// Reassemble a persisted index, validating id uniqueness.
    pub fn from_parts(records: Vec<Record>, meta: IndexMeta) -> Result<Self> {
        let mut seen = HashSet::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            if !seen.insert(r.id.as_str()) {
                return Err(Error::IndexCorrupt {
                    location: format!("record {}", i + 1),
                    message: format!("duplicate id `{}`", r.id),
                });
            }
        }
        if meta.records != records.len() {
            return Err(Error::IndexCorrupt {
                location: "meta".to_string(),
                message: format!(
                    "meta lists {} records but {} were loaded",
                    meta.records,
                    records.len()
                ),
            });
        }
        Ok(Self { records, meta })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Builds an [`Index`] from raw source items.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    normalizer: Normalizer,
    excluded_paths: HashSet<String>,
    unreadable: usize,
}

impl IndexBuilder {
    pub fn new(params: ChunkingParams) -> Self {
        Self {
            normalizer: Normalizer::new(params),
            ..Self::default()
        }
    }

    /// Paths that must not enter the index (benchmark definitions).
    pub fn exclude_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Read failures observed by the connector, carried into the meta.
    pub fn unreadable(mut self, count: usize) -> Self {
        self.unreadable = count;
        self
    }

    pub fn build(&self, mut items: Vec<SourceItem>) -> Index {
        let mut skipped = SkippedCounts {
            unreadable: self.unreadable,
            ..SkippedCounts::default()
        };

        items.retain(|item| {
            let excluded = !item.path.is_empty() && self.excluded_paths.contains(&item.path);
            if excluded {
                tracing::debug!(path = %item.path, "excluded by leakage guard");
                skipped.excluded += 1;
            }
            !excluded
        });
        items.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.url.cmp(&b.url))
                .then_with(|| a.body.cmp(&b.body))
        });

        let mut records = Vec::new();
        let mut seen_content: HashSet<(String, String)> = HashSet::new();
        let mut duplicates = 0usize;

        for item in &items {
            match self.normalizer.normalize(item) {
                Ok(normalized) => {
                    for record in normalized {
                        let key = (record.path.clone(), content_hash(&record.content));
                        if !record.path.is_empty() && !seen_content.insert(key) {
                            duplicates += 1;
                            continue;
                        }
                        records.push(record);
                    }
                }
                Err(err) => {
                    tracing::debug!(path = %item.path, url = ?item.url, %err, "skipped source item");
                    skipped.record(err);
                }
            }
        }

        disambiguate_ids(&mut records);
        let meta = summarize(&records, skipped, duplicates, self.normalizer.params());
        tracing::info!(
            records = meta.records,
            skipped = meta.skipped.total(),
            duplicates = meta.duplicates_collapsed,
            "index built"
        );
        Index { records, meta }
    }
}

fn disambiguate_ids(records: &mut [Record]) {
    let mut used: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
    let mut seen: HashMap<String, usize> = HashMap::new();
    for record in records.iter_mut() {
        let n = seen.entry(record.id.clone()).or_insert(0);
        *n += 1;
        if *n == 1 {
            continue;
        }
        let mut suffix = *n;
        let mut candidate = format!("{}~{}", record.id, suffix);
        while used.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}~{}", record.id, suffix);
        }
        used.insert(candidate.clone());
        record.id = candidate;
    }
}

/// Build the metadata object for a record set.
pub fn summarize(
    records: &[Record],
    skipped: SkippedCounts,
    duplicates_collapsed: usize,
    params: ChunkingParams,
) -> IndexMeta {
    let mut by_type: BTreeMap<String, usize> = BTreeMap::new();
    let mut hasher = Sha256::new();
    for r in records {
        *by_type.entry(r.kind.as_str().to_string()).or_insert(0) += 1;
        hasher.update(r.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(r.content.as_bytes());
        hasher.update([0u8]);
    }
    IndexMeta {
        records: records.len(),
        by_type,
        skipped,
        duplicates_collapsed,
        built_at: chrono::Utc::now().to_rfc3339(),
        generation: format!("{:x}", hasher.finalize()),
        max_chunk_chars: params.max_chars,
    }
}

/// Shared holder for the current index generation.
///
/// Readers take a cheap [`Arc`] snapshot; a rebuild installs a new
/// generation with [`IndexHandle::swap`] and never touches the old one.
#[derive(Debug)]
pub struct IndexHandle {
    current: RwLock<Arc<Index>>,
}

impl IndexHandle {
    pub fn new(index: Index) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Arc<Index> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Install `next`, returning the generation it replaced.
    pub fn swap(&self, next: Index) -> Arc<Index> {
        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }
}

/// Decides which benchmark definition files stay out of the corpus.
///
/// A definition file is excluded unless some case explicitly expects a
/// path matching it, so a question bank cannot answer its own questions.
#[derive(Debug, Clone, Default)]
pub struct LeakageGuard {
    benchmark_paths: Vec<String>,
}

impl LeakageGuard {
    pub fn new<I, S>(benchmark_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            benchmark_paths: benchmark_paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Benchmark paths to exclude given the suites that will be run.
    /// Unparseable patterns never exempt anything.
    pub fn excluded_paths(&self, suites: &[BenchmarkSuite]) -> Vec<String> {
        let expected: Vec<PathPattern> = suites
            .iter()
            .flat_map(|s| s.cases.iter())
            .flat_map(|c| c.expected_path_patterns.iter())
            .filter_map(|p| PathPattern::parse(p).ok())
            .collect();

        self.benchmark_paths
            .iter()
            .filter(|path| !expected.iter().any(|p| p.matches(path)))
            .cloned()
            .collect()
    }
}
