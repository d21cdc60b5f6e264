use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gb_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gb");
    path
}

const BENCHMARK: &str = r#"version: 1
name: retrieval
cases:
  - id: dds_lowcmd
    query: unitree dds lowcmd
    expected_path_patterns: [docs/dds.md]
  - id: firmware
    query: flash firmware image
    expected_path_patterns: [firmware]
"#;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let docs = root.join("files/docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(
        docs.join("dds.md"),
        "# DDS Topics\n\nThe unitree robot publishes lowcmd over DDS.\n\nSubscribe to rt/lowstate for feedback.",
    )
    .unwrap();
    fs::write(
        docs.join("firmware.md"),
        "# Firmware\n\nTo flash a firmware image, put the board in DFU mode first.",
    )
    .unwrap();
    fs::write(
        root.join("files/notes.txt"),
        "Deployment notes.\n\nNothing about robots here.",
    )
    .unwrap();
    fs::write(root.join("files/logo.png"), [0x89u8, b'P', b'N', b'G', 0, 0, 1]).unwrap();

    let bench_dir = root.join("files/benchmarks");
    fs::create_dir_all(&bench_dir).unwrap();
    fs::write(bench_dir.join("retrieval.yaml"), BENCHMARK).unwrap();

    let config_content = format!(
        r#"[index]
dir = "{root}/data/index"

[retrieval]
top_k = 8

[benchmark]
files = ["{root}/files/benchmarks/retrieval.yaml"]
json_out = "{root}/out/eval.json"
md_out = "{root}/out/eval.md"

[[sources]]
kind = "curated_doc"
root = "{root}/files"
include_globs = ["**/*.md", "**/*.txt", "**/*.yaml", "**/*.png"]

[[links]]
id = "unitree_support"
title = "Unitree support portal"
url = "https://support.unitree.com/"
tags = ["support"]
note = "Firmware downloads and manuals."
"#,
        root = root.display()
    );

    let config_path = config_dir.join("gb.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_gb(config_path: &Path, args: &[&str]) -> (String, String, i32) {
    let binary = gb_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code().unwrap_or(-1))
}

/// Directory of the live index generation.
fn current_generation(root: &Path) -> PathBuf {
    let index = root.join("data/index");
    let name = fs::read_to_string(index.join("CURRENT")).unwrap();
    index.join("generations").join(name.trim())
}

fn built_env() -> (TempDir, PathBuf) {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, code) = run_gb(&config, &["build"]);
    assert_eq!(code, 0, "build failed: {}", stderr);
    assert!(stdout.contains("ok"));
    (tmp, config)
}

#[test]
fn test_build_reports_counts() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, code) = run_gb(&config, &["build"]);
    assert_eq!(code, 0, "build failed: {}", stderr);
    assert!(stdout.starts_with("build\n"));
    // 3 text files + 1 link; the png is binary and the benchmark file is guarded
    assert!(stdout.contains("records: 4"), "stdout: {}", stdout);
    assert!(stdout.contains("binary 1"), "stdout: {}", stdout);
    assert!(stdout.contains("excluded 1"), "stdout: {}", stdout);
    let generation = current_generation(tmp.path());
    assert!(generation.join("records.jsonl").exists());
    assert!(generation.join("meta.json").exists());
}

#[test]
fn test_build_dry_run_writes_nothing() {
    let (tmp, config) = setup_test_env();
    let (stdout, _, code) = run_gb(&config, &["build", "--dry-run"]);
    assert_eq!(code, 0);
    assert!(stdout.starts_with("build (dry-run)"));
    assert!(!tmp.path().join("data/index/CURRENT").exists());
}

#[test]
fn test_build_is_deterministic() {
    let (tmp, config) = built_env();
    let first_dir = current_generation(tmp.path());
    let first = fs::read_to_string(first_dir.join("records.jsonl")).unwrap();
    run_gb(&config, &["build"]);
    let second_dir = current_generation(tmp.path());
    assert_ne!(first_dir, second_dir);
    let second = fs::read_to_string(second_dir.join("records.jsonl")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_query_text() {
    let (_tmp, config) = built_env();
    let (stdout, _, code) = run_gb(&config, &["query", "unitree dds lowcmd"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Question: unitree dds lowcmd"));
    let first = stdout.lines().find(|l| l.starts_with("1. ")).unwrap();
    assert!(first.contains("type=curated_doc"), "first: {}", first);
    assert!(stdout.contains("path: docs/dds.md"));
}

#[test]
fn test_query_json() {
    let (_tmp, config) = built_env();
    let (stdout, _, code) = run_gb(
        &config,
        &["query", "flash firmware", "--format", "json", "--explain"],
    );
    assert_eq!(code, 0);
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["status"], "ok");
    let matches = v["matches"].as_array().unwrap();
    assert!(!matches.is_empty());
    assert_eq!(matches[0]["path"], "docs/firmware.md");
    assert_eq!(matches[0]["rank"], 1);
    assert!(matches[0]["explain"]["hits"].as_u64().unwrap() > 0);
}

#[test]
fn test_query_kind_filter() {
    let (_tmp, config) = built_env();
    let (stdout, _, code) = run_gb(
        &config,
        &["query", "firmware", "--format", "json", "--kind", "source_manifest"],
    );
    assert_eq!(code, 0);
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let matches = v["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["type"], "source_manifest");
    assert_eq!(matches[0]["url"], "https://support.unitree.com/");
}

#[test]
fn test_query_punctuation_only() {
    let (_tmp, config) = built_env();
    let (stdout, _, code) = run_gb(&config, &["query", "?!..."]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No searchable terms in query."));
}

#[test]
fn test_query_no_results() {
    let (_tmp, config) = built_env();
    let (stdout, _, code) = run_gb(&config, &["query", "xyzzyplugh"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No relevant matches found."));
}

#[test]
fn test_query_missing_index() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, code) = run_gb(&config, &["query", "dds"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("gb build"), "stderr: {}", stderr);
}

#[test]
fn test_query_corrupt_index() {
    let (tmp, config) = built_env();
    let records = current_generation(tmp.path()).join("records.jsonl");
    let mut raw = fs::read_to_string(&records).unwrap();
    raw.push_str("{not json\n");
    fs::write(&records, raw).unwrap();

    let (_, stderr, code) = run_gb(&config, &["query", "dds"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("records.jsonl:5"), "stderr: {}", stderr);
}

#[test]
fn test_bench_strict_pass() {
    let (tmp, config) = built_env();
    let (stdout, stderr, code) = run_gb(&config, &["bench", "--strict"]);
    assert_eq!(code, 0, "stdout: {}\nstderr: {}", stdout, stderr);
    assert!(stdout.contains("bench retrieval"));
    assert!(stdout.contains("pass rate: 100.00%"));
    assert!(stdout.contains("gate: pass"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("out/eval.json")).unwrap())
            .unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["passed"], 2);
    let md = fs::read_to_string(tmp.path().join("out/eval.md")).unwrap();
    assert!(md.contains("| dds_lowcmd | true |"));
}

#[test]
fn test_bench_strict_fail_still_writes_reports() {
    let (tmp, config) = built_env();
    let failing = tmp.path().join("failing.yaml");
    fs::write(
        &failing,
        "name: failing\ncases:\n  - id: nowhere\n    query: unitree dds\n    expected_path_patterns: [does/not/exist]\n",
    )
    .unwrap();

    let (stdout, _, code) = run_gb(
        &config,
        &["bench", "--benchmark", failing.to_str().unwrap(), "--strict"],
    );
    assert_eq!(code, 1);
    assert!(stdout.contains("FAIL nowhere: no expected path pattern found in top-k"));
    assert!(tmp.path().join("out/eval.json").exists());
    assert!(tmp.path().join("out/eval.md").exists());

    // advisory without --strict
    let (stdout, _, code) = run_gb(&config, &["bench", "--benchmark", failing.to_str().unwrap()]);
    assert_eq!(code, 0);
    assert!(stdout.contains("below threshold (advisory)"));
}

#[test]
fn test_bench_forbidden_pattern() {
    let (tmp, config) = built_env();
    let suite = tmp.path().join("forbidden.yaml");
    fs::write(
        &suite,
        "cases:\n  - id: leak\n    query: unitree dds lowcmd\n    expected_path_patterns: [docs/dds.md]\n    forbidden_path_patterns: [docs/]\n",
    )
    .unwrap();

    let (stdout, _, _) = run_gb(&config, &["bench", "--benchmark", suite.to_str().unwrap()]);
    assert!(stdout.contains("FAIL leak: matched"), "stdout: {}", stdout);
    assert!(stdout.contains("forbidden patterns (limit 0)"));
}

#[test]
fn test_bench_multiple_suites_writes_array() {
    let (tmp, config) = built_env();
    let bench = tmp.path().join("files/benchmarks/retrieval.yaml");
    let second = tmp.path().join("second.yaml");
    fs::write(
        &second,
        "cases:\n  - id: notes\n    query: deployment notes\n    expected_path_patterns: [notes.txt]\n",
    )
    .unwrap();

    let (_, stderr, code) = run_gb(
        &config,
        &[
            "bench",
            "--benchmark",
            bench.to_str().unwrap(),
            "--benchmark",
            second.to_str().unwrap(),
        ],
    );
    assert_eq!(code, 0, "stderr: {}", stderr);
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("out/eval.json")).unwrap())
            .unwrap();
    let reports = json.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1]["name"], "second");
}

#[test]
fn test_bench_refuses_indexed_suite_file() {
    let (tmp, config) = setup_test_env();
    // under the source root but not listed in [benchmark].files
    let extra = tmp.path().join("files/benchmarks/extra.yaml");
    fs::write(
        &extra,
        "cases:\n  - id: dds\n    query: unitree dds lowcmd\n    expected_path_patterns: [docs/]\n",
    )
    .unwrap();
    let (_, stderr, code) = run_gb(&config, &["build"]);
    assert_eq!(code, 0, "build failed: {}", stderr);

    let (_, stderr, code) = run_gb(&config, &["bench", "--benchmark", extra.to_str().unwrap()]);
    assert_ne!(code, 0);
    assert!(stderr.contains("benchmarks/extra.yaml"), "stderr: {}", stderr);
    assert!(stderr.contains("[benchmark].files"), "stderr: {}", stderr);
    assert!(!tmp.path().join("out/eval.json").exists());
}

#[test]
fn test_bench_rejects_bad_threshold() {
    let (_tmp, config) = built_env();
    let (_, stderr, code) = run_gb(&config, &["bench", "--fail-below", "1.5"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("--fail-below"));
}

#[test]
fn test_stats() {
    let (_tmp, config) = built_env();
    let (stdout, _, code) = run_gb(&config, &["stats"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Records:     4"));
    assert!(stdout.contains("curated_doc"));
    assert!(stdout.contains("source_manifest"));
}

#[test]
fn test_bank_converts_questions() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("bank.yaml");
    let output = tmp.path().join("out/bench.yaml");
    fs::write(
        &input,
        "questions:\n  - question: Which DDS topics exist?\n    expected_path_patterns: [docs/]\n  - id: 7\n    question: Flash firmware?\n",
    )
    .unwrap();

    // no config file needed
    let output_cmd = Command::new(gb_binary())
        .args(["bank", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .output()
        .unwrap();
    assert!(output_cmd.status.success());

    let raw = fs::read_to_string(&output).unwrap();
    assert!(raw.contains("name: question_bank"));
    assert!(raw.contains("id: q_1"));
    assert!(raw.contains("id: '7'"));
}
