//! `gb build`: scan sources, build a fresh generation, persist it.
//!
//! Benchmark definition files listed under `[benchmark].files` are kept
//! out of the corpus unless a case expects them (leakage guard).

use anyhow::Result;
use groundbench_core::index::LeakageGuard;
use groundbench_core::normalize::ChunkingParams;
use groundbench_core::{Index, IndexBuilder};

use crate::bench::load_suites;
use crate::config::Config;
use crate::connector_fs::{self, ScanReport};
use crate::index_store;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Paths of benchmark definition files that must not be indexed.
pub fn leakage_exclusions(config: &Config) -> Result<Vec<String>> {
    if config.benchmark.files.is_empty() {
        return Ok(Vec::new());
    }
    let suites = load_suites(&config.benchmark.files)?;
    let paths: Vec<String> = config
        .benchmark
        .files
        .iter()
        .filter_map(|f| connector_fs::corpus_path(config, f))
        .collect();
    Ok(LeakageGuard::new(paths).excluded_paths(&suites))
}

/// Scan and build without writing anything.
pub fn build_index(config: &Config, progress: &dyn ProgressReporter) -> Result<(Index, ScanReport)> {
    let mut scan = connector_fs::scan_sources(config, progress)?;
    let excluded = leakage_exclusions(config)?;
    for path in &excluded {
        tracing::info!(path = %path, "benchmark file excluded from corpus");
    }

    let builder = IndexBuilder::new(ChunkingParams {
        max_chars: config.chunking.max_chars,
    })
    .exclude_paths(excluded)
    .unreadable(scan.unreadable);

    let items = std::mem::take(&mut scan.items);
    let scanned = items.len();
    let index = builder.build(items);
    tracing::debug!(scanned, records = index.len(), "build finished");
    Ok((index, scan))
}

pub fn run_build(config: &Config, dry_run: bool, progress: &dyn ProgressReporter) -> Result<()> {
    let (index, scan) = build_index(config, progress)?;
    let meta = index.meta();

    let written = if dry_run {
        println!("build (dry-run)");
        None
    } else {
        progress.report(ProgressEvent::Writing {
            records: index.len() as u64,
        });
        let generation_dir = index_store::write_index(&config.index.dir, &index)?;
        println!("build");
        Some(generation_dir)
    };

    println!("  records: {}", meta.records);
    for (kind, count) in &meta.by_type {
        println!("    {}: {}", kind, count);
    }
    let s = &meta.skipped;
    println!(
        "  skipped: {} (binary {}, not utf-8 {}, empty {}, unreadable {}, excluded {})",
        s.total(),
        s.binary,
        s.not_utf8,
        s.empty,
        s.unreadable,
        s.excluded
    );
    if scan.oversized > 0 {
        println!("  over size cap: {}", scan.oversized);
    }
    println!("  duplicates collapsed: {}", meta.duplicates_collapsed);
    if let Some(generation_dir) = written {
        println!("  index: {}", generation_dir.display());
        println!("  generation: {}", meta.generation);
    }
    println!("ok");
    Ok(())
}
