//! Index statistics and health overview.
//!
//! Prints a quick summary of the persisted generation: record counts per
//! kind, skipped inputs, and when it was built. Used by `gb stats`.

use anyhow::Result;

use crate::config::Config;
use crate::index_store;

/// Run the stats command: load the index and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let dir = &config.index.dir;
    let index = index_store::load_index(dir)?;
    let meta = index.meta();

    let generation_dir = index_store::current_generation(dir)?;
    let size = std::fs::metadata(generation_dir.join(index_store::RECORDS_FILE))
        .map(|m| m.len())
        .unwrap_or(0);

    println!("groundbench index stats");
    println!("=======================");
    println!();
    println!("  Index:       {}", generation_dir.display());
    println!("  Size:        {}", format_bytes(size));
    println!("  Built:       {}", format_built_at(&meta.built_at));
    println!("  Generation:  {}", short_hash(&meta.generation));
    println!("  Chunk size:  {} chars", meta.max_chunk_chars);
    println!();
    println!("  Records:     {}", meta.records);
    println!("  Duplicates:  {}", meta.duplicates_collapsed);
    let s = &meta.skipped;
    println!(
        "  Skipped:     {} (binary {}, not utf-8 {}, empty {}, unreadable {}, excluded {})",
        s.total(),
        s.binary,
        s.not_utf8,
        s.empty,
        s.unreadable,
        s.excluded
    );

    if !meta.by_type.is_empty() {
        println!();
        println!("  By type:");
        println!("  {:<20} {:>8}", "TYPE", "RECORDS");
        println!("  {}", "-".repeat(29));
        for (kind, count) in &meta.by_type {
            println!("  {:<20} {:>8}", kind, count);
        }
    }

    println!();
    Ok(())
}

fn short_hash(h: &str) -> &str {
    h.get(..12).unwrap_or(h)
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// RFC 3339 timestamp plus a relative hint, e.g. `2026-01-02 10:00 (3 hours ago)`.
fn format_built_at(built_at: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(built_at) {
        Ok(dt) => {
            let ts = dt.timestamp();
            format!(
                "{} ({})",
                dt.format("%Y-%m-%d %H:%M"),
                format_ts_relative(ts, chrono::Utc::now().timestamp())
            )
        }
        Err(_) => built_at.to_string(),
    }
}

fn format_ts_relative(ts: i64, now: i64) -> String {
    let delta = now - ts;
    if delta < 0 {
        "in the future".to_string()
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    }
}
