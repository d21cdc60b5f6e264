//! Benchmark harness: labeled cases run through the ranker and judged
//! against expected and forbidden path patterns.
//!
//! Each case moves through `pending → retrieved → evaluated`, modelled as
//! [`PendingCase`], [`RetrievedCase`] and [`EvaluatedCase`]; only the last
//! one carries a [`Verdict`]. A case failure never stops the run, and the
//! [`EvaluationReport`] is always produced before any gating decision.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::index::Index;
use crate::models::{Record, RecordKind, ScoredRecord};
use crate::pattern::{parse_all, PathPattern};
use crate::rank::{search, Query, DEFAULT_TOP_K};
use crate::score::Scorer;

/// Default pass-rate gate.
pub const DEFAULT_FAIL_BELOW: f64 = 0.80;

/// A named battery of cases, as read from a benchmark YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSuite {
    pub version: u32,
    pub name: String,
    /// Suite-wide overrides of the harness parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_below: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbidden_limit: Option<usize>,
    pub cases: Vec<BenchmarkCase>,
}

impl BenchmarkSuite {
    /// Structural checks. A bad suite is fatal; a bad pattern is not.
    pub fn validate(&self) -> Result<()> {
        if let Some(f) = self.fail_below {
            if !(0.0..=1.0).contains(&f) {
                return Err(Error::InvalidBenchmark(format!(
                    "fail_below must be within [0, 1], got {}",
                    f
                )));
            }
        }
        if self.top_k == Some(0) {
            return Err(Error::InvalidBenchmark("top_k must be at least 1".to_string()));
        }
        let mut ids = HashSet::new();
        for (i, case) in self.cases.iter().enumerate() {
            if case.id.trim().is_empty() {
                return Err(Error::InvalidBenchmark(format!("case {} has an empty id", i + 1)));
            }
            if !ids.insert(case.id.as_str()) {
                return Err(Error::InvalidBenchmark(format!("duplicate case id `{}`", case.id)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkCase {
    pub id: String,
    pub query: String,
    pub expected_path_patterns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forbidden_path_patterns: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub require_all_expected: bool,
    /// Overrides the suite's forbidden limit for this case only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forbidden_limit: Option<usize>,
}

/// Run-wide harness parameters after all overrides are applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HarnessParams {
    pub top_k: usize,
    pub fail_below: f64,
    pub forbidden_limit: usize,
}

impl Default for HarnessParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            fail_below: DEFAULT_FAIL_BELOW,
            forbidden_limit: 0,
        }
    }
}

impl HarnessParams {
    /// Apply the suite's own overrides on top of these defaults.
    pub fn with_suite(self, suite: &BenchmarkSuite) -> Self {
        Self {
            top_k: suite.top_k.unwrap_or(self.top_k),
            fail_below: suite.fail_below.unwrap_or(self.fail_below),
            forbidden_limit: suite.forbidden_limit.unwrap_or(self.forbidden_limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    /// `matched_pattern` and `rank` are `None` when the case had no
    /// expected patterns and passed on the forbidden rule alone.
    Passed {
        matched_pattern: Option<String>,
        rank: Option<usize>,
    },
    Failed { reasons: Vec<String> },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Passed { .. })
    }

    /// One-line human explanation.
    pub fn reason(&self) -> String {
        match self {
            Verdict::Passed {
                matched_pattern: Some(p),
                rank: Some(r),
            } => format!("matched pattern `{}` at rank {}", p, r),
            Verdict::Passed { .. } => "no expected patterns".to_string(),
            Verdict::Failed { reasons } => reasons.join("; "),
        }
    }
}

/// A case that has not been run yet.
#[derive(Debug, Clone, Copy)]
pub struct PendingCase<'a> {
    case: &'a BenchmarkCase,
}

impl<'a> PendingCase<'a> {
    pub fn new(case: &'a BenchmarkCase) -> Self {
        Self { case }
    }

    pub fn retrieve(self, index: &Index, scorer: &Scorer, top_k: usize) -> RetrievedCase<'a> {
        let response = search(index, scorer, &Query::new(&self.case.query).top_k(top_k));
        RetrievedCase {
            case: self.case,
            results: response.results,
        }
    }
}

/// A case with its ranked results, not yet judged.
#[derive(Debug, Clone)]
pub struct RetrievedCase<'a> {
    case: &'a BenchmarkCase,
    results: Vec<ScoredRecord>,
}

impl<'a> RetrievedCase<'a> {
    pub fn results(&self) -> &[ScoredRecord] {
        &self.results
    }

    /// Judge the results. `default_forbidden_limit` applies unless the case
    /// sets its own.
    pub fn evaluate(self, default_forbidden_limit: usize) -> EvaluatedCase<'a> {
        let forbidden_limit = self.case.forbidden_limit.unwrap_or(default_forbidden_limit);
        let (verdict, forbidden_matches) = judge(self.case, &self.results, forbidden_limit);
        EvaluatedCase {
            case: self.case,
            results: self.results,
            forbidden_matches,
            verdict,
        }
    }
}

/// A judged case.
#[derive(Debug, Clone)]
pub struct EvaluatedCase<'a> {
    pub case: &'a BenchmarkCase,
    pub results: Vec<ScoredRecord>,
    pub forbidden_matches: usize,
    pub verdict: Verdict,
}

impl EvaluatedCase<'_> {
    pub fn report(&self) -> CaseReport {
        let (matched_pattern, rank) = match &self.verdict {
            Verdict::Passed {
                matched_pattern,
                rank,
            } => (matched_pattern.clone(), *rank),
            Verdict::Failed { .. } => (None, None),
        };
        let reasons = match &self.verdict {
            Verdict::Failed { reasons } => reasons.clone(),
            Verdict::Passed { .. } => Vec::new(),
        };
        CaseReport {
            id: self.case.id.clone(),
            query: self.case.query.clone(),
            pass: self.verdict.is_pass(),
            reason: self.verdict.reason(),
            matched_pattern,
            rank,
            reasons,
            forbidden_matches: self.forbidden_matches,
            expected_path_patterns: self.case.expected_path_patterns.clone(),
            forbidden_path_patterns: self.case.forbidden_path_patterns.clone(),
            top_results: self
                .results
                .iter()
                .enumerate()
                .map(|(i, r)| ResultSummary::new(i + 1, r))
                .collect(),
        }
    }
}

fn invalid_pattern_reason(err: &Error) -> String {
    match err {
        Error::Pattern { pattern, message } => format!("invalid pattern `{}`: {}", pattern, message),
        other => other.to_string(),
    }
}

fn judge(case: &BenchmarkCase, results: &[ScoredRecord], forbidden_limit: usize) -> (Verdict, usize) {
    let (expected, mut errors) = parse_all(&case.expected_path_patterns);
    let (forbidden, forbidden_errors) = parse_all(&case.forbidden_path_patterns);
    errors.extend(forbidden_errors);
    if !errors.is_empty() {
        let reasons = errors.iter().map(invalid_pattern_reason).collect();
        return (Verdict::Failed { reasons }, 0);
    }

    let records: Vec<&Record> = results.iter().map(|r| &r.record).collect();
    let mut reasons = Vec::new();
    let mut hit: Option<(String, usize)> = None;

    if !expected.is_empty() {
        if case.require_all_expected {
            let assignment = assign_distinct(&expected, &records);
            for (pattern, slot) in expected.iter().zip(&assignment) {
                match slot {
                    Some(r) => {
                        if hit.as_ref().map_or(true, |(_, best)| r + 1 < *best) {
                            hit = Some((pattern.as_str().to_string(), r + 1));
                        }
                    }
                    None => reasons.push(format!("missing expected pattern {}", pattern.as_str())),
                }
            }
            if !reasons.is_empty() {
                hit = None;
            }
        } else {
            hit = first_hit(&expected, &records);
            if hit.is_none() {
                reasons.push("no expected path pattern found in top-k".to_string());
            }
        }
    }

    let forbidden_matches = records
        .iter()
        .filter(|r| forbidden.iter().any(|p| p.matches_record(r)))
        .count();
    if forbidden_matches > forbidden_limit {
        reasons.push(format!(
            "matched {} forbidden patterns (limit {})",
            forbidden_matches, forbidden_limit
        ));
    }

    let verdict = if reasons.is_empty() {
        let (matched_pattern, rank) = match hit {
            Some((p, r)) => (Some(p), Some(r)),
            None => (None, None),
        };
        Verdict::Passed {
            matched_pattern,
            rank,
        }
    } else {
        Verdict::Failed { reasons }
    };
    (verdict, forbidden_matches)
}

/// First `(pattern, rank)` in rank order; patterns are tried in listed
/// order within each rank.
fn first_hit(patterns: &[PathPattern], records: &[&Record]) -> Option<(String, usize)> {
    records.iter().enumerate().find_map(|(i, r)| {
        patterns
            .iter()
            .find(|p| p.matches_record(r))
            .map(|p| (p.as_str().to_string(), i + 1))
    })
}

/// Assign each pattern a distinct matching result (maximum bipartite
/// matching). Returns the result index per pattern, `None` if unassigned.
fn assign_distinct(patterns: &[PathPattern], records: &[&Record]) -> Vec<Option<usize>> {
    let adjacency: Vec<Vec<usize>> = patterns
        .iter()
        .map(|p| {
            records
                .iter()
                .enumerate()
                .filter(|(_, r)| p.matches_record(r))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let mut owner: Vec<Option<usize>> = vec![None; records.len()];
    for p in 0..patterns.len() {
        let mut visited = vec![false; records.len()];
        augment(p, &adjacency, &mut owner, &mut visited);
    }

    let mut assignment = vec![None; patterns.len()];
    for (r, o) in owner.iter().enumerate() {
        if let Some(p) = o {
            assignment[*p] = Some(r);
        }
    }
    assignment
}

fn augment(p: usize, adjacency: &[Vec<usize>], owner: &mut [Option<usize>], visited: &mut [bool]) -> bool {
    for &r in &adjacency[p] {
        if visited[r] {
            continue;
        }
        visited[r] = true;
        let free = match owner[r] {
            None => true,
            Some(q) => augment(q, adjacency, owner, visited),
        };
        if free {
            owner[r] = Some(p);
            return true;
        }
    }
    false
}

/// Compact view of one ranked result inside a [`CaseReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub rank: usize,
    pub score: f64,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
}

impl ResultSummary {
    fn new(rank: usize, r: &ScoredRecord) -> Self {
        Self {
            rank,
            score: (r.score * 10_000.0).round() / 10_000.0,
            id: r.record.id.clone(),
            kind: r.record.kind,
            path: r.record.path.clone(),
            url: r.record.url.clone(),
            title: r.record.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseReport {
    pub id: String,
    pub query: String,
    pub pass: bool,
    pub reason: String,
    pub matched_pattern: Option<String>,
    pub rank: Option<usize>,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub forbidden_matches: usize,
    pub expected_path_patterns: Vec<String>,
    #[serde(default)]
    pub forbidden_path_patterns: Vec<String>,
    pub top_results: Vec<ResultSummary>,
}

/// Aggregate outcome of one suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub top_k: usize,
    pub fail_below: f64,
    pub forbidden_limit: usize,
    /// RFC 3339 timestamp.
    pub generated_at: String,
    pub cases: Vec<CaseReport>,
}

/// Exit decision derived from a finished report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    Pass,
    /// Below threshold but not in strict mode.
    Advisory { pass_rate: f64, fail_below: f64 },
    Fail { pass_rate: f64, fail_below: f64 },
}

impl Gate {
    pub fn is_failure(&self) -> bool {
        matches!(self, Gate::Fail { .. })
    }
}

impl EvaluationReport {
    pub fn meets_threshold(&self) -> bool {
        self.pass_rate >= self.fail_below
    }

    pub fn gate(&self, strict: bool) -> Gate {
        if self.meets_threshold() {
            Gate::Pass
        } else if strict {
            Gate::Fail {
                pass_rate: self.pass_rate,
                fail_below: self.fail_below,
            }
        } else {
            Gate::Advisory {
                pass_rate: self.pass_rate,
                fail_below: self.fail_below,
            }
        }
    }
}

/// Runs suites against one index generation.
#[derive(Debug, Clone, Copy)]
pub struct Harness<'a> {
    index: &'a Index,
    scorer: &'a Scorer,
}

impl<'a> Harness<'a> {
    pub fn new(index: &'a Index, scorer: &'a Scorer) -> Self {
        Self { index, scorer }
    }

    pub fn evaluate_case<'c>(&self, case: &'c BenchmarkCase, params: HarnessParams) -> EvaluatedCase<'c> {
        PendingCase::new(case)
            .retrieve(self.index, self.scorer, params.top_k)
            .evaluate(params.forbidden_limit)
    }

    pub fn run(&self, suite: &BenchmarkSuite, params: HarnessParams) -> EvaluationReport {
        let mut cases = Vec::with_capacity(suite.cases.len());
        for case in &suite.cases {
            let evaluated = self.evaluate_case(case, params);
            tracing::debug!(
                case = %case.id,
                pass = evaluated.verdict.is_pass(),
                reason = %evaluated.verdict.reason(),
                "case evaluated"
            );
            cases.push(evaluated.report());
        }

        let total = cases.len();
        let passed = cases.iter().filter(|c| c.pass).count();
        let pass_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64
        };
        tracing::info!(suite = %suite.name, passed, total, pass_rate, "benchmark finished");

        EvaluationReport {
            name: suite.name.clone(),
            total,
            passed,
            failed: total - passed,
            pass_rate,
            top_k: params.top_k,
            fail_below: params.fail_below,
            forbidden_limit: params.forbidden_limit,
            generated_at: chrono::Utc::now().to_rfc3339(),
            cases,
        }
    }
}
