//! `gb bench`: run benchmark suites against the persisted index and write
//! JSON and Markdown reports.
//!
//! Reports are always written before the gate is applied; strict mode only
//! changes the exit status.

use anyhow::{bail, Context, Result};
use groundbench_core::bench::{BenchmarkSuite, EvaluationReport, Gate, Harness, HarnessParams};
use groundbench_core::index::LeakageGuard;
use groundbench_core::{Index, Scorer};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::connector_fs;
use crate::index_store;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Command-line overrides for one `gb bench` run.
#[derive(Debug, Clone, Default)]
pub struct BenchOptions {
    pub benchmarks: Vec<PathBuf>,
    pub top_k: Option<usize>,
    pub fail_below: Option<f64>,
    pub strict: bool,
    pub json_out: Option<PathBuf>,
    pub md_out: Option<PathBuf>,
}

/// Read and validate one benchmark YAML file. A suite without a name is
/// named after its file stem.
pub fn load_suite(path: &Path) -> Result<BenchmarkSuite> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read benchmark file: {}", path.display()))?;
    let mut suite: BenchmarkSuite = serde_yaml::from_str(&raw)
        .with_context(|| format!("Invalid benchmark format: {}", path.display()))?;
    if suite.name.trim().is_empty() {
        suite.name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "benchmark".to_string());
    }
    suite
        .validate()
        .with_context(|| format!("Invalid benchmark: {}", path.display()))?;
    Ok(suite)
}

pub fn load_suites(paths: &[PathBuf]) -> Result<Vec<BenchmarkSuite>> {
    paths.iter().map(|p| load_suite(p)).collect()
}

/// Parameter precedence: command line, then suite, then `[benchmark]`.
fn params_for(config: &Config, opts: &BenchOptions, suite: &BenchmarkSuite) -> HarnessParams {
    let base = HarnessParams {
        top_k: config.top_k(config.benchmark.top_k),
        fail_below: config.benchmark.fail_below,
        forbidden_limit: config.benchmark.forbidden_limit,
    };
    let mut params = base.with_suite(suite);
    if let Some(k) = opts.top_k {
        params.top_k = k;
    }
    if let Some(f) = opts.fail_below {
        params.fail_below = f;
    }
    params.top_k = config.top_k(Some(params.top_k));
    params
}

/// Evaluate every suite. Returns one report per suite, in input order.
pub fn evaluate(
    config: &Config,
    opts: &BenchOptions,
    progress: &dyn ProgressReporter,
) -> Result<Vec<EvaluationReport>> {
    if let Some(f) = opts.fail_below {
        if !(0.0..=1.0).contains(&f) {
            bail!("--fail-below must be in [0.0, 1.0]");
        }
    }
    let files = if opts.benchmarks.is_empty() {
        &config.benchmark.files
    } else {
        &opts.benchmarks
    };
    if files.is_empty() {
        bail!("No benchmark files: pass --benchmark or set [benchmark].files");
    }

    let suites = load_suites(files)?;
    let index = index_store::load_index(&config.index.dir)?;
    for (file, suite) in files.iter().zip(&suites) {
        if let Some(path) = indexed_definition(config, &index, file, suite) {
            bail!(
                "Benchmark {} is indexed as `{}` and could answer its own cases; \
                 add it to [benchmark].files and run `gb build` again",
                file.display(),
                path
            );
        }
    }
    let scorer = Scorer::new(config.scoring.clone());
    let harness = Harness::new(&index, &scorer);

    let reports = suites
        .iter()
        .map(|suite| {
            progress.report(ProgressEvent::Evaluating {
                suite: suite.name.clone(),
                cases: suite.cases.len() as u64,
            });
            harness.run(suite, params_for(config, opts, suite))
        })
        .collect();
    Ok(reports)
}

/// The corpus path of a suite's own definition file when the index holds
/// it and no case of the suite expects it.
fn indexed_definition(
    config: &Config,
    index: &Index,
    file: &Path,
    suite: &BenchmarkSuite,
) -> Option<String> {
    let path = connector_fs::corpus_path(config, file)?;
    LeakageGuard::new([path])
        .excluded_paths(std::slice::from_ref(suite))
        .into_iter()
        .find(|p| index.records().iter().any(|r| &r.path == p))
}

fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

pub fn report_markdown(report: &EvaluationReport) -> String {
    let mut lines = vec![
        "# Retrieval Evaluation".to_string(),
        String::new(),
        format!("- Benchmark: {}", report.name),
        format!("- Total cases: {}", report.total),
        format!("- Passed: {}", report.passed),
        format!("- Pass rate: {}", percent(report.pass_rate)),
        format!("- Top-K: {}", report.top_k),
        format!("- Threshold: {}", percent(report.fail_below)),
        format!("- Forbidden limit: {}", report.forbidden_limit),
        String::new(),
        "| Case | Pass | Reason |".to_string(),
        "| --- | --- | --- |".to_string(),
    ];
    for case in &report.cases {
        lines.push(format!(
            "| {} | {} | {} |",
            cell(&case.id),
            case.pass,
            cell(&case.reason)
        ));
    }
    lines.join("\n") + "\n"
}

/// Write both reports. A single suite is written as one JSON object;
/// several as an array.
pub fn write_reports(reports: &[EvaluationReport], json_out: &Path, md_out: &Path) -> Result<()> {
    for out in [json_out, md_out] {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let json = match reports {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };
    fs::write(json_out, json + "\n")
        .with_context(|| format!("Failed to write {}", json_out.display()))?;

    let md = reports
        .iter()
        .map(report_markdown)
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(md_out, md).with_context(|| format!("Failed to write {}", md_out.display()))?;
    Ok(())
}

/// Run the benchmark command. Returns `true` when the strict gate failed;
/// the caller turns that into the exit status.
pub fn run_bench(config: &Config, opts: &BenchOptions, progress: &dyn ProgressReporter) -> Result<bool> {
    let reports = evaluate(config, opts, progress)?;
    let json_out = opts.json_out.as_ref().unwrap_or(&config.benchmark.json_out);
    let md_out = opts.md_out.as_ref().unwrap_or(&config.benchmark.md_out);
    write_reports(&reports, json_out, md_out)?;

    let mut failed = false;
    for report in &reports {
        println!("bench {}", report.name);
        println!("  cases: {}", report.total);
        println!("  passed: {}", report.passed);
        println!("  pass rate: {}", percent(report.pass_rate));
        println!("  threshold: {}", percent(report.fail_below));
        for case in report.cases.iter().filter(|c| !c.pass) {
            println!("  FAIL {}: {}", case.id, case.reason);
        }
        match report.gate(opts.strict) {
            Gate::Pass => println!("  gate: pass"),
            Gate::Advisory {
                pass_rate,
                fail_below,
            } => {
                tracing::warn!(suite = %report.name, pass_rate, fail_below, "pass rate below threshold");
                println!("  gate: below threshold (advisory)");
            }
            Gate::Fail {
                pass_rate,
                fail_below,
            } => {
                tracing::warn!(suite = %report.name, pass_rate, fail_below, "strict gate failed");
                println!("  gate: FAIL");
                failed = true;
            }
        }
    }
    println!("  json: {}", json_out.display());
    println!("  markdown: {}", md_out.display());
    Ok(failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use groundbench_core::bench::BenchmarkCase;
    use tempfile::TempDir;

    #[test]
    fn test_load_suite_names_from_file_stem() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("hard_negatives.yaml");
        fs::write(
            &path,
            "cases:\n  - id: a\n    query: dds\n    expected_path_patterns: [docs/]\n",
        )
        .unwrap();
        let suite = load_suite(&path).unwrap();
        assert_eq!(suite.name, "hard_negatives");
        assert_eq!(suite.cases.len(), 1);
    }

    #[test]
    fn test_load_suite_rejects_duplicate_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dup.yaml");
        fs::write(&path, "cases:\n  - id: a\n    query: x\n  - id: a\n    query: y\n").unwrap();
        assert!(load_suite(&path).is_err());
    }

    #[test]
    fn test_params_precedence() {
        let mut config = Config::default();
        config.benchmark.top_k = Some(10);
        let suite = BenchmarkSuite {
            top_k: Some(5),
            fail_below: Some(0.5),
            cases: vec![BenchmarkCase::default()],
            ..BenchmarkSuite::default()
        };
        let p = params_for(&config, &BenchOptions::default(), &suite);
        assert_eq!(p.top_k, 5);
        assert_eq!(p.fail_below, 0.5);

        let opts = BenchOptions {
            top_k: Some(3),
            ..BenchOptions::default()
        };
        assert_eq!(params_for(&config, &opts, &suite).top_k, 3);

        let opts = BenchOptions {
            top_k: Some(999),
            ..BenchOptions::default()
        };
        assert_eq!(params_for(&config, &opts, &suite).top_k, 50);
    }

    #[test]
    fn test_markdown_table() {
        let report = EvaluationReport {
            name: "retrieval".into(),
            total: 2,
            passed: 1,
            failed: 1,
            pass_rate: 0.5,
            top_k: 8,
            fail_below: 0.8,
            forbidden_limit: 0,
            generated_at: "2026-01-01T00:00:00Z".into(),
            cases: vec![],
        };
        let md = report_markdown(&report);
        assert!(md.starts_with("# Retrieval Evaluation\n"));
        assert!(md.contains("- Pass rate: 50.00%"));
        assert!(md.contains("- Threshold: 80.00%"));
        assert!(md.contains("| Case | Pass | Reason |"));
    }

    #[test]
    fn test_indexed_definition_is_detected() {
        use crate::config::SourceConfig;
        use groundbench_core::{IndexBuilder, RecordKind, SourceItem};

        let mut config = Config::default();
        config.sources.push(SourceConfig {
            kind: RecordKind::CuratedDoc,
            root: PathBuf::from("corpus"),
            prefix: String::new(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            url: None,
            tags: Vec::new(),
            follow_symlinks: false,
            max_file_bytes: 250_000,
        });
        let index = IndexBuilder::default().build(vec![SourceItem::text(
            RecordKind::CuratedDoc,
            "bench/extra.yaml",
            "cases: dds lowcmd",
        )]);
        let file = Path::new("corpus/bench/extra.yaml");
        let mut suite = BenchmarkSuite {
            cases: vec![BenchmarkCase {
                id: "a".into(),
                query: "dds".into(),
                expected_path_patterns: vec!["docs/".into()],
                ..BenchmarkCase::default()
            }],
            ..BenchmarkSuite::default()
        };
        assert_eq!(
            indexed_definition(&config, &index, file, &suite).as_deref(),
            Some("bench/extra.yaml")
        );

        suite.cases[0].expected_path_patterns.push("bench/extra.yaml".into());
        assert_eq!(indexed_definition(&config, &index, file, &suite), None);

        let elsewhere = Path::new("other/extra.yaml");
        assert_eq!(indexed_definition(&Config::default(), &index, elsewhere, &suite), None);
    }
}
