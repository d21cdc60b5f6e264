//! Record normalizer: raw [`SourceItem`]s in, [`Record`]s out.
//!
//! Decodes the body, strips markup according to the path extension,
//! derives a title and tags, and splits long text into chunks. Each chunk
//! becomes its own record sharing the item's `path`.
//!
//! Binary, non-UTF-8, and empty bodies are reported as [`NormalizeError`]
//! so the index builder can count them; they are never fatal.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::chunk::{chunk_markdown, chunk_text, is_heading, DEFAULT_MAX_CHARS};
use crate::error::NormalizeError;
use crate::models::{Record, SourceItem};
use crate::tokenize::{is_stopword, tokenize};

/// How many leading bytes are inspected for NUL when sniffing binaries.
const BINARY_SNIFF_BYTES: usize = 8192;

static FRONT_MATTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\A---[ \t]*\r?\n(?s:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)")
        .expect("front matter regex")
});
static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:```|~~~).*$").expect("code fence regex"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\n]*)`").expect("inline code regex"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("image regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("link regex"));
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*+]|\d+\.)[ \t]+").expect("list marker regex"));

static SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script regex"));
static STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("style regex"));
static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)</?(?:p|div|br|li|ul|ol|tr|table|section|article|header|footer|h[1-6]|pre)\b[^>]*>",
    )
    .expect("block tag regex")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex"));
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});").expect("entity regex")
});
static HTML_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("title regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub max_chars: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
        }
    }
}

/// Markup family of a body, picked from the path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Markup {
    Markdown,
    Html,
    Plain,
}

impl Markup {
    fn from_path(path: &str) -> Self {
        match extension(path).as_str() {
            "md" | "markdown" => Markup::Markdown,
            "html" | "htm" => Markup::Html,
            _ => Markup::Plain,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    params: ChunkingParams,
}

impl Normalizer {
    pub fn new(params: ChunkingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> ChunkingParams {
        self.params
    }

    /// Convert one raw item into zero or more records.
    pub fn normalize(&self, item: &SourceItem) -> Result<Vec<Record>, NormalizeError> {
        let raw = decode(&item.body)?;
        let markup = Markup::from_path(&item.path);

        let (front, body) = match markup {
            Markup::Markdown => split_front_matter(&raw),
            _ => (FrontMatter::default(), raw.as_str()),
        };

        let (cleaned, derived_title) = match markup {
            Markup::Markdown => {
                let text = strip_markdown(body);
                let heading = first_heading(&text);
                (text, heading)
            }
            Markup::Html => (strip_html(body), html_title(body)),
            Markup::Plain => (normalize_whitespace(body), None),
        };

        let chunks = match markup {
            Markup::Markdown => chunk_markdown(&cleaned, self.params.max_chars),
            _ => chunk_text(&cleaned, self.params.max_chars),
        };
        if chunks.is_empty() {
            return Err(NormalizeError::Empty);
        }

        let title = item
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or(front.title)
            .or(derived_title)
            .or_else(|| file_name(&item.path))
            .or_else(|| item.url.clone())
            .unwrap_or_default();

        let mut tags: Vec<String> = item
            .tags
            .iter()
            .cloned()
            .chain(front.tags.map(Tags::into_vec).unwrap_or_default())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        tags.extend(path_keywords(&item.path));
        tags.sort();
        tags.dedup();

        let key = if !item.path.is_empty() {
            item.path.clone()
        } else if let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) {
            url.to_string()
        } else {
            title.clone()
        };
        let prefix = item.kind.id_prefix();
        let single = chunks.len() == 1;

        Ok(chunks
            .into_iter()
            .map(|chunk| Record {
                id: if single {
                    format!("{}:{}", prefix, key)
                } else {
                    format!("{}:{}:chunk-{:04}", prefix, key, chunk.index)
                },
                path: item.path.clone(),
                url: item.url.clone(),
                kind: item.kind,
                title: title.clone(),
                tags: tags.clone(),
                content: chunk.text,
            })
            .collect())
    }
}

/// Decode body bytes, rejecting binaries and invalid UTF-8.
pub fn decode(body: &[u8]) -> Result<String, NormalizeError> {
    let sniff = &body[..body.len().min(BINARY_SNIFF_BYTES)];
    if sniff.contains(&0) {
        return Err(NormalizeError::Binary);
    }
    String::from_utf8(body.to_vec()).map_err(|_| NormalizeError::NotUtf8)
}

fn extension(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(pos) if pos > 0 => name[pos + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

fn file_name(path: &str) -> Option<String> {
    path.rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .map(|n| n.to_string())
}

/// Title and tags declared in a leading `---` YAML block. Other keys are
/// ignored.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct FrontMatter {
    title: Option<String>,
    tags: Option<Tags>,
}

/// `tags: [a, b]`, a block list, or `tags: a, b`.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(untagged)]
enum Tags {
    List(Vec<String>),
    Csv(String),
}

impl Tags {
    fn into_vec(self) -> Vec<String> {
        match self {
            Tags::List(tags) => tags,
            Tags::Csv(raw) => raw.split(',').map(|t| t.trim().to_string()).collect(),
        }
    }
}

/// Split a leading front-matter block from markdown text. A block that is
/// not valid YAML is still removed from the body.
fn split_front_matter(text: &str) -> (FrontMatter, &str) {
    let Some(caps) = FRONT_MATTER.captures(text) else {
        return (FrontMatter::default(), text);
    };
    let end = caps.get(0).map_or(0, |m| m.end());
    let yaml = caps.get(1).map_or("", |m| m.as_str());

    let mut front = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(yaml).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "ignoring unparseable front matter");
            FrontMatter::default()
        })
    };
    front.title = front
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    (front, &text[end..])
}

/// Reduce markdown to plain text, keeping heading lines for the chunker.
pub fn strip_markdown(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "");
    let text = IMAGE.replace_all(&text, " ");
    let text = LINK.replace_all(&text, "$1");
    let text = INLINE_CODE.replace_all(&text, "$1");
    let text = LIST_MARKER.replace_all(&text, "");
    normalize_whitespace(&text)
}

/// Reduce HTML to text: drop script/style, turn block tags into paragraph
/// breaks, strip remaining tags, and decode entities.
pub fn strip_html(html: &str) -> String {
    let text = SCRIPT.replace_all(html, " ");
    let text = STYLE.replace_all(&text, " ");
    let text = BLOCK_TAG.replace_all(&text, "\n\n");
    let text = TAG.replace_all(&text, " ");
    normalize_whitespace(&decode_entities(&text))
}

fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => entity.strip_prefix('#').and_then(|d| d.parse().ok()),
                }
                .and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn html_title(html: &str) -> Option<String> {
    let inner = HTML_TITLE.captures(html)?.get(1)?.as_str();
    let title = collapse_spaces(&decode_entities(inner));
    (!title.is_empty()).then_some(title)
}

fn first_heading(text: &str) -> Option<String> {
    text.lines()
        .find(|l| is_heading(l))
        .map(|l| l.trim_start().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Collapse intra-line whitespace and runs of blank lines.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed: String = text
        .lines()
        .map(|l| collapse_spaces(l) + "\n")
        .collect();
    collapse_blank_lines(&collapsed)
}

fn collapse_spaces(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 && !out.is_empty() {
                out.push('\n');
            }
            continue;
        }
        blank_run = 0;
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Keywords from directory names and the file stem of `path`.
pub fn path_keywords(path: &str) -> Vec<String> {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let stem = segments.pop().map(|name| match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    });
    segments
        .into_iter()
        .chain(stem)
        .flat_map(tokenize)
        .flat_map(|t| {
            // `low_level` also contributes `low` and `level`.
            let mut parts = vec![t.clone()];
            if t.contains('_') {
                parts.extend(t.split('_').filter(|p| !p.is_empty()).map(str::to_string));
            }
            parts
        })
        .filter(|t| t.len() > 1 && !is_stopword(t) && !t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}
