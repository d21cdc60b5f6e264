//! TOML configuration.
//!
//! Every table is optional; a missing table takes its defaults. Paths are
//! used as written, so relative paths resolve against the working
//! directory.
//!
//! ```toml
//! [index]
//! dir = "data/index"
//!
//! [retrieval]
//! top_k = 8
//!
//! [[sources]]
//! kind = "curated_doc"
//! root = "docs"
//! prefix = "docs"
//! ```

use anyhow::{bail, Context, Result};
use globset::Glob;
use groundbench_core::bench::DEFAULT_FAIL_BELOW;
use groundbench_core::chunk::DEFAULT_MAX_CHARS;
use groundbench_core::rank::DEFAULT_TOP_K;
use groundbench_core::{RecordKind, ScoringConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
        }
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("data/index")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_top_k: default_max_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_max_top_k() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchmarkConfig {
    /// Benchmark definition files. Also fed to the leakage guard at build.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default = "default_fail_below")]
    pub fail_below: f64,
    #[serde(default)]
    pub forbidden_limit: usize,
    #[serde(default = "default_json_out")]
    pub json_out: PathBuf,
    #[serde(default = "default_md_out")]
    pub md_out: PathBuf,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            top_k: None,
            fail_below: default_fail_below(),
            forbidden_limit: 0,
            json_out: default_json_out(),
            md_out: default_md_out(),
        }
    }
}

fn default_fail_below() -> f64 {
    DEFAULT_FAIL_BELOW
}
fn default_json_out() -> PathBuf {
    PathBuf::from("docs/verification/retrieval_eval.json")
}
fn default_md_out() -> PathBuf {
    PathBuf::from("docs/verification/retrieval_eval.md")
}

/// A directory tree indexed as one record kind.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub kind: RecordKind,
    pub root: PathBuf,
    /// Prepended to each file's path relative to `root`.
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Upstream locator attached to every record from this source.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.{md,markdown,txt,rst,yaml,yml,json,toml,ini,cfg}".to_string(),
        "**/*.{py,sh,bash,zsh,c,cc,cpp,cxx,h,hpp,java,js,mjs,ts,tsx}".to_string(),
        "**/*.{html,htm,css,xml,launch,urdf,xacro,proto,cmake}".to_string(),
        "**/{README,LICENSE,Makefile}".to_string(),
    ]
}

fn default_max_file_bytes() -> u64 {
    250_000
}

/// A URL-only catalogue entry, indexed as a `source_manifest` record.
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Config {
    /// The effective result count for a query: the request, or the
    /// configured default, clamped to `1..=max_top_k`.
    pub fn top_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.retrieval.top_k)
            .clamp(1, self.retrieval.max_top_k)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }

    let r = &config.retrieval;
    if r.max_top_k == 0 {
        bail!("retrieval.max_top_k must be >= 1");
    }
    if r.top_k == 0 || r.top_k > r.max_top_k {
        bail!("retrieval.top_k must be in [1, {}]", r.max_top_k);
    }

    let b = &config.benchmark;
    if !(0.0..=1.0).contains(&b.fail_below) {
        bail!("benchmark.fail_below must be in [0.0, 1.0]");
    }
    if let Some(k) = b.top_k {
        if k == 0 || k > r.max_top_k {
            bail!("benchmark.top_k must be in [1, {}]", r.max_top_k);
        }
    }

    validate_scoring(&config.scoring)?;

    for (i, source) in config.sources.iter().enumerate() {
        for pattern in source.include_globs.iter().chain(&source.exclude_globs) {
            Glob::new(pattern)
                .with_context(|| format!("sources[{}]: invalid glob '{}'", i, pattern))?;
        }
        if source.max_file_bytes == 0 {
            bail!("sources[{}].max_file_bytes must be > 0", i);
        }
    }

    for link in &config.links {
        if link.url.trim().is_empty() {
            bail!("links '{}': url must not be empty", link.id);
        }
    }

    Ok(())
}

fn validate_scoring(s: &ScoringConfig) -> Result<()> {
    if s.saturation == 0 {
        bail!("scoring.saturation must be >= 1");
    }
    let weights = [
        ("scoring.coverage_weight", s.coverage_weight),
        ("scoring.noise_weight", s.noise_weight),
        ("scoring.unverified_weight", s.unverified_weight),
    ];
    for (name, w) in weights {
        if w.is_nan() || w < 0.0 {
            bail!("{} must be >= 0", name);
        }
    }
    for (kind, boost) in &s.type_boosts {
        kind.parse::<RecordKind>()
            .map_err(|e| anyhow::anyhow!("scoring.type_boosts: {}", e))?;
        if boost.is_nan() || *boost < 0.0 {
            bail!("scoring.type_boosts.{} must be >= 0", kind);
        }
    }
    for rule in &s.path_weights {
        if rule.weight.is_nan() || rule.weight < 0.0 {
            bail!("scoring.path_weights '{}' must be >= 0", rule.prefix);
        }
    }
    Ok(())
}
