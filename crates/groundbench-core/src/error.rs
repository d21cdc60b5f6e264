//! Error taxonomy for the core crate.
//!
//! Per-record and per-case failures are recoverable: [`NormalizeError`] is
//! counted by the index builder and pattern errors fail a single benchmark
//! case. Only a corrupt persisted index is fatal to the caller.

use thiserror::Error;

/// Why a raw source item produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("binary content")]
    Binary,

    #[error("content is not valid UTF-8")]
    NotUtf8,

    #[error("no text after normalization")]
    Empty,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("corrupt index at {location}: {message}")]
    IndexCorrupt { location: String, message: String },

    #[error("invalid path pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    #[error("invalid benchmark: {0}")]
    InvalidBenchmark(String),
}

pub type Result<T> = std::result::Result<T, Error>;
