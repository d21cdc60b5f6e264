//! On-disk index format.
//!
//! Every build writes a complete generation directory and then switches
//! the `CURRENT` pointer file to it:
//!
//! ```text
//! <index dir>/
//!   CURRENT                  name of the live generation
//!   generations/<name>/
//!     records.jsonl          one serialized Record per line
//!     meta.json              pretty-printed IndexMeta
//!     index.md               first 1000 records as a table
//! ```
//!
//! A generation is staged as `<name>.tmp`, renamed into place, and only
//! then does `CURRENT` (written to `CURRENT.tmp`, then renamed) point at
//! it. Readers resolve the pointer once, so they load one generation or
//! the other, never records from one and meta from another. The previous
//! generation is kept for readers that resolved the pointer just before a
//! swap; older ones are pruned.

use anyhow::{bail, Context, Result};
use groundbench_core::index::summarize;
use groundbench_core::models::{IndexMeta, SkippedCounts};
use groundbench_core::normalize::ChunkingParams;
use groundbench_core::{Error, Index, Record};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const RECORDS_FILE: &str = "records.jsonl";
pub const META_FILE: &str = "meta.json";
pub const SUMMARY_FILE: &str = "index.md";
pub const CURRENT_FILE: &str = "CURRENT";
pub const GENERATIONS_DIR: &str = "generations";

const SUMMARY_ROWS: usize = 1000;

fn read_pointer(dir: &Path) -> Result<Option<String>> {
    let pointer = dir.join(CURRENT_FILE);
    match fs::read_to_string(&pointer) {
        Ok(raw) => {
            let name = raw.trim();
            if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
                bail!(Error::IndexCorrupt {
                    location: CURRENT_FILE.to_string(),
                    message: format!("invalid generation name {:?}", name),
                });
            }
            Ok(Some(name.to_string()))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", pointer.display())),
    }
}

/// Directory holding the live generation. An index directory without a
/// pointer file is read as a single flat generation.
pub fn current_generation(dir: &Path) -> Result<PathBuf> {
    Ok(match read_pointer(dir)? {
        Some(name) => dir.join(GENERATIONS_DIR).join(name),
        None => dir.to_path_buf(),
    })
}

pub fn records_path(dir: &Path) -> Result<PathBuf> {
    Ok(current_generation(dir)?.join(RECORDS_FILE))
}

/// Unique, sortable directory name for a new generation.
fn generation_name(index: &Index) -> String {
    let hash = index.meta().generation.as_str();
    format!(
        "{}-{}",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%f"),
        hash.get(..12).unwrap_or(hash)
    )
}

/// Write `index` as a new generation and make it current. Returns the
/// generation directory.
pub fn write_index(dir: &Path, index: &Index) -> Result<PathBuf> {
    let generations = dir.join(GENERATIONS_DIR);
    fs::create_dir_all(&generations)
        .with_context(|| format!("Failed to create index directory: {}", generations.display()))?;
    let previous = read_pointer(dir)?;

    let name = generation_name(index);
    let staging = generations.join(format!("{}.tmp", name));
    fs::create_dir_all(&staging)
        .with_context(|| format!("Failed to create {}", staging.display()))?;

    let mut lines = String::new();
    for record in index.records() {
        lines.push_str(&serde_json::to_string(record)?);
        lines.push('\n');
    }
    write_file(&staging.join(RECORDS_FILE), lines.as_bytes())?;
    write_file(
        &staging.join(META_FILE),
        serde_json::to_string_pretty(index.meta())?.as_bytes(),
    )?;
    write_file(&staging.join(SUMMARY_FILE), summary_markdown(index).as_bytes())?;

    let target = generations.join(&name);
    fs::rename(&staging, &target)
        .with_context(|| format!("Failed to move generation into {}", target.display()))?;

    let pointer_tmp = dir.join(format!("{}.tmp", CURRENT_FILE));
    write_file(&pointer_tmp, format!("{}\n", name).as_bytes())?;
    fs::rename(&pointer_tmp, dir.join(CURRENT_FILE))
        .with_context(|| format!("Failed to switch {}", dir.join(CURRENT_FILE).display()))?;
    tracing::info!(generation = %name, "index generation switched");

    prune(&generations, &name, previous.as_deref());
    Ok(target)
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Remove generations other than `current` and `previous`. Failures are
/// logged and left for the next build.
fn prune(generations: &Path, current: &str, previous: Option<&str>) {
    let Ok(entries) = fs::read_dir(generations) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == current || Some(name.as_str()) == previous {
            continue;
        }
        if let Err(err) = fs::remove_dir_all(entry.path()) {
            tracing::warn!(generation = %name, %err, "could not prune old generation");
        }
    }
}

fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn summary_markdown(index: &Index) -> String {
    let meta = index.meta();
    let mut out = String::new();
    out.push_str("# Knowledge Index\n\n");
    out.push_str(&format!("- Records: {}\n", meta.records));
    out.push_str(&format!("- Built: {}\n", meta.built_at));
    out.push_str(&format!("- Generation: {}\n\n", meta.generation));
    out.push_str("| ID | Type | Title | Tags | Path |\n");
    out.push_str("| --- | --- | --- | --- | --- |\n");
    for r in index.records().iter().take(SUMMARY_ROWS) {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            cell(&r.id),
            r.kind,
            cell(&r.title),
            cell(&r.tags.join(",")),
            cell(&r.path)
        ));
    }
    out
}

/// Load the live generation. Any malformed record line is fatal and
/// reported with its location.
pub fn load_index(dir: &Path) -> Result<Index> {
    load_generation(&current_generation(dir)?)
}

fn load_generation(dir: &Path) -> Result<Index> {
    let records_file = dir.join(RECORDS_FILE);
    let content = fs::read_to_string(&records_file).with_context(|| {
        format!(
            "Failed to read index at {} (run `gb build` first)",
            records_file.display()
        )
    })?;

    let mut records = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: Record = serde_json::from_str(line).map_err(|e| {
            let err = Error::IndexCorrupt {
                location: format!("{}:{}", RECORDS_FILE, i + 1),
                message: e.to_string(),
            };
            tracing::error!(%err, "index load failed");
            err
        })?;
        records.push(record);
    }

    let meta_file = dir.join(META_FILE);
    let meta: IndexMeta = if meta_file.exists() {
        let raw = fs::read_to_string(&meta_file)
            .with_context(|| format!("Failed to read {}", meta_file.display()))?;
        serde_json::from_str(&raw).map_err(|e| Error::IndexCorrupt {
            location: META_FILE.to_string(),
            message: e.to_string(),
        })?
    } else {
        tracing::warn!(dir = %dir.display(), "meta.json missing, recomputing from records");
        summarize(&records, SkippedCounts::default(), 0, ChunkingParams::default())
    };

    let index = Index::from_parts(records, meta).map_err(|err| {
        tracing::error!(%err, "index load failed");
        err
    })?;
    tracing::debug!(records = index.len(), generation = %index.meta().generation, "index loaded");
    Ok(index)
}
