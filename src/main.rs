//! # groundbench CLI (`gb`)
//!
//! ## Usage
//!
//! ```bash
//! gb --config ./config/gb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gb build` | Scan configured sources and write a new index generation |
//! | `gb query "<text>"` | Rank records for a query |
//! | `gb bench` | Run benchmark suites and write JSON/Markdown reports |
//! | `gb stats` | Summarize the persisted index |
//! | `gb bank` | Convert a question bank into a benchmark suite |
//!
//! ## Examples
//!
//! ```bash
//! gb build
//! gb query "unitree dds lowcmd" --top-k 5 --explain
//! gb query "flash firmware" --format json --kind support_doc
//! gb bench --benchmark benchmarks/retrieval.yaml --strict
//! ```

use clap::{ArgAction, Parser, Subcommand};
use groundbench::bench::{run_bench, BenchOptions};
use groundbench::progress::ProgressMode;
use groundbench::render::OutputFormat;
use groundbench::search::{run_query, QueryOptions};
use groundbench::{bank, config, ingest, logging, stats};
use groundbench_core::RecordKind;
use std::path::PathBuf;

/// groundbench: a lexical retrieval index with a grounding benchmark.
#[derive(Parser)]
#[command(
    name = "gb",
    about = "groundbench - lexical retrieval with a grounding benchmark",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gb.toml")]
    config: PathBuf,

    /// Progress output on stderr: auto, off, human or json.
    #[arg(long, global = true, default_value = "auto")]
    progress: ProgressMode,

    /// Increase log verbosity (-v info, -vv debug). `GB_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan sources and write a fresh index generation.
    ///
    /// The previous generation stays in place until the new one is
    /// fully written.
    Build {
        /// Report counts without writing the index.
        #[arg(long)]
        dry_run: bool,
    },

    /// Rank indexed records for a query.
    Query {
        /// The query text.
        query: String,

        /// Maximum number of results (clamped to `retrieval.max_top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only consider records of this type (repeatable).
        #[arg(long = "kind")]
        kinds: Vec<RecordKind>,

        /// Attach a per-result score breakdown.
        #[arg(long)]
        explain: bool,
    },

    /// Run benchmark suites against the index.
    ///
    /// Exits 1 under `--strict` when a suite's pass rate is below its
    /// threshold. Reports are written either way.
    Bench {
        /// Benchmark YAML file (repeatable). Defaults to `[benchmark].files`.
        #[arg(long = "benchmark")]
        benchmarks: Vec<PathBuf>,

        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum pass rate in [0, 1].
        #[arg(long)]
        fail_below: Option<f64>,

        /// Fail the process when the pass rate is below the threshold.
        #[arg(long)]
        strict: bool,

        #[arg(long)]
        json_out: Option<PathBuf>,

        #[arg(long)]
        md_out: Option<PathBuf>,
    },

    /// Show index statistics.
    Stats,

    /// Convert a question bank YAML into a benchmark suite.
    Bank {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,

        /// Suite name written into the output.
        #[arg(long, default_value = bank::DEFAULT_NAME)]
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let progress = cli.progress.reporter();
    let load = || config::load_config(&cli.config);

    match cli.command {
        Commands::Build { dry_run } => {
            ingest::run_build(&load()?, dry_run, progress.as_ref())?;
        }
        Commands::Query {
            query,
            top_k,
            format,
            kinds,
            explain,
        } => {
            let opts = QueryOptions {
                top_k,
                format,
                kinds,
                explain,
            };
            run_query(&load()?, &query, &opts)?;
        }
        Commands::Bench {
            benchmarks,
            top_k,
            fail_below,
            strict,
            json_out,
            md_out,
        } => {
            let opts = BenchOptions {
                benchmarks,
                top_k,
                fail_below,
                strict,
                json_out,
                md_out,
            };
            if run_bench(&load()?, &opts, progress.as_ref())? {
                std::process::exit(1);
            }
        }
        Commands::Stats => {
            stats::run_stats(&load()?)?;
        }
        Commands::Bank {
            input,
            output,
            name,
        } => {
            bank::run_bank(&input, &output, &name)?;
        }
    }

    Ok(())
}
