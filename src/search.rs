//! `gb query`: load the persisted index, rank, and render.

use anyhow::Result;
use groundbench_core::{search, Query, RecordKind, Scorer, SearchResponse};

use crate::config::Config;
use crate::index_store;
use crate::render::{render, OutputFormat};

/// Options for one `gb query` invocation.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub top_k: Option<usize>,
    pub format: OutputFormat,
    pub kinds: Vec<RecordKind>,
    pub explain: bool,
}

pub fn query_index(config: &Config, text: &str, opts: &QueryOptions) -> Result<SearchResponse> {
    let index = index_store::load_index(&config.index.dir)?;
    let scorer = Scorer::new(config.scoring.clone());
    let query = Query {
        text,
        top_k: config.top_k(opts.top_k),
        kinds: &opts.kinds,
        explain: opts.explain,
    };
    Ok(search(&index, &scorer, &query))
}

pub fn run_query(config: &Config, text: &str, opts: &QueryOptions) -> Result<()> {
    let response = query_index(config, text, opts)?;
    print!("{}", render(&response, opts.format)?);
    if opts.format == OutputFormat::Json {
        println!();
    }
    Ok(())
}
