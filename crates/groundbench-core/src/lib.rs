//! # groundbench core
//!
//! Pure retrieval logic for groundbench: record models, the normalizer and
//! chunker, the index builder, the lexical scorer, the ranker, path
//! patterns, and benchmark evaluation.
//!
//! This crate performs no filesystem or network I/O. The application crate
//! scans sources into [`models::SourceItem`]s, persists the built
//! [`index::Index`], and renders results.
//!
//! ```text
//! SourceItem ──▶ Normalizer ──▶ IndexBuilder ──▶ Index
//!                                                  │
//!                       Query ──▶ Scorer + rank ◀──┘
//!                                      │
//!              BenchmarkSuite ──▶ Harness ──▶ EvaluationReport
//! ```

pub mod bench;
pub mod chunk;
pub mod error;
pub mod index;
pub mod models;
pub mod normalize;
pub mod pattern;
pub mod rank;
pub mod score;
pub mod tokenize;

pub use error::{Error, NormalizeError, Result};
pub use index::{Index, IndexBuilder, IndexHandle};
pub use models::{Record, RecordKind, ScoredRecord, SourceItem};
pub use rank::{search, Query, SearchResponse, SearchStatus};
pub use score::{Scorer, ScoringConfig};
