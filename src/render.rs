//! Presentation adapters for query results: plain text, JSON and Markdown.

use anyhow::Result;
use groundbench_core::score::ScoreBreakdown;
use groundbench_core::{RecordKind, SearchResponse, SearchStatus};
use serde::Serialize;

/// Maximum snippet length in characters.
pub const SNIPPET_CHARS: usize = 320;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

/// A window of `content` around the earliest query-token hit, flattened to
/// one line. Falls back to the leading `max_chars` when nothing matches.
pub fn build_snippet(content: &str, tokens: &[String], max_chars: usize) -> String {
    let plain = content.replace('\n', " ");
    let plain = plain.trim();
    let chars: Vec<char> = plain.chars().collect();
    if chars.len() <= max_chars {
        return plain.to_string();
    }

    // ASCII lowering keeps byte offsets aligned with `plain`.
    let lower = plain.to_ascii_lowercase();
    let first_hit = tokens.iter().filter_map(|t| lower.find(t.as_str())).min();

    let start = match first_hit {
        Some(byte) => plain[..byte].chars().count().saturating_sub(max_chars / 3),
        None => 0,
    };
    let end = (start + max_chars).min(chars.len());
    chars[start..end].iter().collect::<String>().trim().to_string()
}

#[derive(Serialize)]
struct JsonMatch<'a> {
    rank: usize,
    score: f64,
    id: &'a str,
    #[serde(rename = "type")]
    kind: RecordKind,
    title: &'a str,
    path: &'a str,
    url: Option<&'a str>,
    tags: &'a [String],
    snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    explain: Option<ScoreBreakdown>,
}

#[derive(Serialize)]
struct JsonResponse<'a> {
    question: &'a str,
    tokens: &'a [String],
    top_k: usize,
    status: SearchStatus,
    matches: Vec<JsonMatch<'a>>,
}

pub fn render(response: &SearchResponse, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(response)),
        OutputFormat::Json => render_json(response),
        OutputFormat::Markdown => Ok(render_markdown(response)),
    }
}

fn snippet(response: &SearchResponse, content: &str) -> String {
    build_snippet(content, &response.tokens, SNIPPET_CHARS)
}

fn render_json(response: &SearchResponse) -> Result<String> {
    let matches = response
        .results
        .iter()
        .enumerate()
        .map(|(i, r)| JsonMatch {
            rank: i + 1,
            score: (r.score * 10_000.0).round() / 10_000.0,
            id: &r.record.id,
            kind: r.record.kind,
            title: &r.record.title,
            path: &r.record.path,
            url: r.record.url.as_deref(),
            tags: &r.record.tags,
            snippet: snippet(response, &r.record.content),
            explain: r.explain,
        })
        .collect();
    let payload = JsonResponse {
        question: &response.query,
        tokens: &response.tokens,
        top_k: response.top_k,
        status: response.status,
        matches,
    };
    Ok(serde_json::to_string_pretty(&payload)?)
}

fn render_markdown(response: &SearchResponse) -> String {
    let mut out = format!("# Query\n\n{}\n\n", response.query);
    if response.results.is_empty() {
        out.push_str("_No relevant matches found._\n");
        return out;
    }
    for (i, r) in response.results.iter().enumerate() {
        out.push_str(&format!("## {}. {} (`{}`)\n\n", i + 1, r.record.title, r.record.kind));
        out.push_str(&format!("- score: `{:.2}`\n", r.score));
        if !r.record.path.is_empty() {
            out.push_str(&format!("- path: `{}`\n", r.record.path));
        }
        if let Some(url) = &r.record.url {
            out.push_str(&format!("- url: {}\n", url));
        }
        out.push_str(&format!("- snippet: {}\n\n", snippet(response, &r.record.content)));
    }
    out
}

fn render_text(response: &SearchResponse) -> String {
    if response.status == SearchStatus::NoTokens {
        return "No searchable terms in query.\n".to_string();
    }
    if response.results.is_empty() {
        return "No relevant matches found.\n".to_string();
    }

    let mut out = format!("Question: {}\n", response.query);
    out.push_str(&format!("Top {} matches:\n\n", response.results.len()));
    for (i, r) in response.results.iter().enumerate() {
        out.push_str(&format!(
            "{}. score={:.2} id={} type={}\n",
            i + 1,
            r.score,
            r.record.id,
            r.record.kind
        ));
        out.push_str(&format!("   title: {}\n", r.record.title));
        if !r.record.path.is_empty() {
            out.push_str(&format!("   path: {}\n", r.record.path));
        }
        if let Some(url) = &r.record.url {
            out.push_str(&format!("   url: {}\n", url));
        }
        if let Some(b) = &r.explain {
            out.push_str(&format!(
                "   explain: hits={} coverage={:.2} type_boost={:.2} path_weight={:.2}\n",
                b.hits, b.coverage, b.type_boost, b.path_weight
            ));
        }
        out.push_str(&format!("   preview: {}\n", snippet(response, &r.record.content)));
    }
    out
}
