//! Build and benchmark progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts. Human lines look like `build docs  scanned  1,234 files`;
//! JSON mode writes one object per line.

use std::io::Write;
use std::str::FromStr;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Walking a source root. Total unknown.
    Scanning { source: String },
    /// A source root has been walked.
    Scanned { source: String, files: u64 },
    /// Persisting a freshly built generation.
    Writing { records: u64 },
    /// A benchmark suite is being evaluated.
    Evaluating { suite: String, cases: u64 },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Scanning { source } => format!("build {}  scanning...\n", source),
            ProgressEvent::Scanned { source, files } => {
                format!("build {}  scanned  {} files\n", source, format_number(*files))
            }
            ProgressEvent::Writing { records } => {
                format!("build  writing  {} records\n", format_number(*records))
            }
            ProgressEvent::Evaluating { suite, cases } => {
                format!("bench {}  evaluating  {} cases\n", suite, format_number(*cases))
            }
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Scanning { source } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "scanning"
            }),
            ProgressEvent::Scanned { source, files } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": "scanned",
                "files": files
            }),
            ProgressEvent::Writing { records } => serde_json::json!({
                "event": "progress",
                "phase": "writing",
                "records": records
            }),
            ProgressEvent::Evaluating { suite, cases } => serde_json::json!({
                "event": "progress",
                "suite": suite,
                "phase": "evaluating",
                "cases": cases
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

/// Parses `--progress`; `auto` resolves against the terminal.
impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ProgressMode::default_for_tty()),
            "off" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}'; expected auto, off, human or json",
                other
            )),
        }
    }
}
