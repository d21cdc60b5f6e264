//! `gb bank`: convert a question bank into a benchmark suite.
//!
//! Input shape:
//!
//! ```yaml
//! questions:
//!   - id: dds_topics
//!     question: Which DDS topics carry low-level motor commands?
//!     expected_path_patterns: [unitree_sdk2, docs/]
//! ```
//!
//! Entries without question text are dropped; a missing id becomes
//! `q_<n>` where `n` counts the cases kept so far.

use anyhow::{bail, Context, Result};
use groundbench_core::bench::{BenchmarkCase, BenchmarkSuite};
use serde_yaml::Value;
use std::fs;
use std::path::Path;

pub const DEFAULT_NAME: &str = "question_bank";

fn scalar(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub fn convert(raw: &str, name: &str) -> Result<BenchmarkSuite> {
    let payload: Value = serde_yaml::from_str(raw).context("Invalid question bank YAML")?;
    if !payload.is_mapping() {
        bail!("Invalid question bank format: expected a mapping with `questions`");
    }
    let questions = match payload.get("questions") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Sequence(seq)) => seq.clone(),
        Some(_) => bail!("Invalid question bank: `questions` must be a list"),
    };

    let mut cases: Vec<BenchmarkCase> = Vec::new();
    for q in questions.iter().filter(|q| q.is_mapping()) {
        let question = scalar(q.get("question"));
        if question.is_empty() {
            continue;
        }
        let mut id = scalar(q.get("id"));
        if id.is_empty() {
            id = format!("q_{}", cases.len() + 1);
        }
        let patterns = match q.get("expected_path_patterns") {
            Some(Value::Sequence(seq)) => seq
                .iter()
                .map(|p| scalar(Some(p)))
                .filter(|p| !p.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        cases.push(BenchmarkCase {
            id,
            query: question,
            expected_path_patterns: patterns,
            ..BenchmarkCase::default()
        });
    }

    Ok(BenchmarkSuite {
        version: 1,
        name: name.to_string(),
        cases,
        ..BenchmarkSuite::default()
    })
}

pub fn run_bank(input: &Path, output: &Path, name: &str) -> Result<()> {
    let raw = fs::read_to_string(input)
        .with_context(|| format!("Failed to read question bank: {}", input.display()))?;
    let suite = convert(&raw, name)?;
    suite
        .validate()
        .with_context(|| format!("Question bank produces an invalid benchmark: {}", input.display()))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(output, serde_yaml::to_string(&suite)?)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("bank {}", suite.name);
    println!("  cases: {}", suite.cases.len());
    println!("  output: {}", output.display());
    Ok(())
}
