//! Filesystem connector: turns `[[sources]]` trees and `[[links]]` entries
//! into raw [`SourceItem`]s for the index builder.
//!
//! Files are read as bytes; decoding and binary detection happen in the
//! normalizer. A file that cannot be read is counted, never fatal.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use groundbench_core::{RecordKind, SourceItem};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, LinkConfig, SourceConfig};
use crate::progress::{ProgressEvent, ProgressReporter};

const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/target/**",
    "**/node_modules/**",
    "**/build/**",
    "**/dist/**",
    "**/__pycache__/**",
    "**/.pytest_cache/**",
    "**/.mypy_cache/**",
    "**/.ruff_cache/**",
];

/// Everything one scan produced.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub items: Vec<SourceItem>,
    /// Files or directory entries that could not be read.
    pub unreadable: usize,
    /// Files skipped for exceeding `max_file_bytes`.
    pub oversized: usize,
}

pub fn scan_sources(config: &Config, progress: &dyn ProgressReporter) -> Result<ScanReport> {
    let mut report = ScanReport::default();

    for source in &config.sources {
        let label = source_label(source);
        progress.report(ProgressEvent::Scanning {
            source: label.clone(),
        });
        let before = report.items.len();
        scan_source(source, &mut report)?;
        progress.report(ProgressEvent::Scanned {
            source: label,
            files: (report.items.len() - before) as u64,
        });
    }

    report.items.extend(config.links.iter().map(link_item));

    // Sort for deterministic ordering
    report
        .items
        .sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.url.cmp(&b.url)));

    Ok(report)
}

fn source_label(source: &SourceConfig) -> String {
    if source.prefix.is_empty() {
        source.root.display().to_string()
    } else {
        source.prefix.clone()
    }
}

fn scan_source(source: &SourceConfig, report: &mut ScanReport) -> Result<()> {
    let root = &source.root;
    if !root.exists() {
        bail!("Source root does not exist: {}", root.display());
    }

    let include_set = build_globset(&source.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(source.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let walker = WalkDir::new(root).follow_links(source.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::debug!(root = %root.display(), %err, "unreadable entry");
                report.unreadable += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = slash_path(relative);

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match entry.metadata() {
            Ok(meta) if meta.len() > source.max_file_bytes => {
                tracing::debug!(path = %rel_str, bytes = meta.len(), "over size cap");
                report.oversized += 1;
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(path = %rel_str, %err, "unreadable metadata");
                report.unreadable += 1;
                continue;
            }
        }

        match std::fs::read(path) {
            Ok(body) => report.items.push(SourceItem {
                kind: source.kind,
                path: join_prefix(&source.prefix, &rel_str),
                url: source.url.clone(),
                title: None,
                tags: source.tags.clone(),
                body,
            }),
            Err(err) => {
                tracing::debug!(path = %rel_str, %err, "unreadable file");
                report.unreadable += 1;
            }
        }
    }

    Ok(())
}

fn link_item(link: &LinkConfig) -> SourceItem {
    let title = link.title.clone().unwrap_or_else(|| link.id.clone());
    let mut body = title.clone();
    if let Some(note) = link.note.as_deref().filter(|n| !n.trim().is_empty()) {
        body.push_str("\n\n");
        body.push_str(note.trim());
    }
    body.push_str("\n\n");
    body.push_str(&link.url);

    SourceItem {
        kind: RecordKind::SourceManifest,
        path: String::new(),
        url: Some(link.url.clone()),
        title: Some(title),
        tags: link.tags.clone(),
        body: body.into_bytes(),
    }
}

/// The record path a file on disk would be indexed under, if any source
/// root contains it. Paths are compared as written first, then resolved,
/// so a relative file still maps onto an absolute root.
pub fn corpus_path(config: &Config, file: &Path) -> Option<String> {
    let lexical_file = lexical(file);
    let resolved_file = std::fs::canonicalize(file).ok();
    config.sources.iter().find_map(|source| {
        let rel = match lexical_file.strip_prefix(lexical(&source.root)) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => {
                let root = std::fs::canonicalize(&source.root).ok()?;
                resolved_file.as_ref()?.strip_prefix(&root).ok()?.to_path_buf()
            }
        };
        Some(join_prefix(&source.prefix, &slash_path(&rel)))
    })
}

fn lexical(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn join_prefix(prefix: &str, rel: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        rel.to_string()
    } else {
        format!("{}/{}", prefix, rel)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    fn source(root: &Path, prefix: &str) -> SourceConfig {
        SourceConfig {
            kind: RecordKind::CuratedDoc,
            root: root.to_path_buf(),
            prefix: prefix.to_string(),
            include_globs: vec!["**/*.md".to_string()],
            exclude_globs: vec![],
            url: None,
            tags: vec!["curated".to_string()],
            follow_symlinks: false,
            max_file_bytes: 64,
        }
    }

    #[test]
    fn test_scan_applies_globs_prefix_and_size_cap() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("guide")).unwrap();
        fs::create_dir_all(root.join("node_modules/x")).unwrap();
        fs::write(root.join("guide/b.md"), "# B").unwrap();
        fs::write(root.join("a.md"), "# A").unwrap();
        fs::write(root.join("skip.txt"), "nope").unwrap();
        fs::write(root.join("node_modules/x/c.md"), "# C").unwrap();
        fs::write(root.join("big.md"), "x".repeat(100)).unwrap();

        let config = Config {
            sources: vec![source(root, "docs/")],
            ..Config::default()
        };
        let report = scan_sources(&config, &NoProgress).unwrap();
        let paths: Vec<&str> = report.items.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["docs/a.md", "docs/guide/b.md"]);
        assert_eq!(report.oversized, 1);
        assert_eq!(report.items[0].tags, vec!["curated"]);
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let config = Config {
            sources: vec![source(Path::new("/nonexistent/gb-root"), "")],
            ..Config::default()
        };
        assert!(scan_sources(&config, &NoProgress).is_err());
    }

    #[test]
    fn test_links_become_manifest_items() {
        let config = Config {
            links: vec![LinkConfig {
                id: "sdk".into(),
                title: None,
                url: "https://github.com/unitreerobotics/unitree_sdk2".into(),
                tags: vec!["sdk".into()],
                note: Some("C++ SDK".into()),
            }],
            ..Config::default()
        };
        let report = scan_sources(&config, &NoProgress).unwrap();
        let item = &report.items[0];
        assert_eq!(item.kind, RecordKind::SourceManifest);
        assert!(item.path.is_empty());
        assert_eq!(item.title.as_deref(), Some("sdk"));
        assert!(String::from_utf8_lossy(&item.body).contains("C++ SDK"));
    }

    #[test]
    fn test_corpus_path_maps_through_prefix() {
        let config = Config {
            sources: vec![source(Path::new("./benchmarks"), "benchmarks")],
            ..Config::default()
        };
        assert_eq!(
            corpus_path(&config, Path::new("benchmarks/retrieval.yaml")).as_deref(),
            Some("benchmarks/retrieval.yaml")
        );
        assert_eq!(corpus_path(&config, Path::new("docs/x.md")), None);
    }
}
