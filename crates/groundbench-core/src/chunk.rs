//! Paragraph-boundary text chunker.
//!
//! Splits normalized document text into [`Chunk`]s of at most `max_chars`
//! bytes. Splitting happens on block boundaries (blank lines, and for
//! markdown the line before a heading) so a chunk never starts
//! mid-paragraph when it can be avoided.
//!
//! # Algorithm
//!
//! 1. Split text into blocks at blank lines ([`chunk_markdown`] also splits
//!    before heading lines; `# ` in code is a comment, not a heading).
//! 2. Accumulate blocks into a buffer until adding the next block would
//!    exceed `max_chars`.
//! 3. When exceeded, flush the buffer as a chunk and start a new one.
//! 4. A single block longer than `max_chars` is hard-split at the last
//!    sentence end, else the last newline, else the last space before the
//!    limit, always on a UTF-8 char boundary.
//!
//! # Example
//!
//! ```rust
//! use groundbench_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 1600);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].index, 0);
//! ```

use sha2::{Digest, Sha256};

/// Default chunk size, in bytes of normalized text.
pub const DEFAULT_MAX_CHARS: usize = 1600;

/// A contiguous slice of a document's normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Split text into chunks on block boundaries, respecting `max_chars`.
///
/// # Guarantees
///
/// - Whitespace-only text yields no chunks.
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - No chunk text is empty or exceeds `max_chars` (a lone code point
///   wider than `max_chars` is the only exception).
/// - The output depends only on the input: rebuilding yields equal chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<Chunk> {
    pack_blocks(split_blocks(text, false), max_chars)
}

/// Like [`chunk_text`], but a markdown heading always starts a new block.
pub fn chunk_markdown(text: &str, max_chars: usize) -> Vec<Chunk> {
    pack_blocks(split_blocks(text, true), max_chars)
}

fn pack_blocks(blocks: Vec<String>, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current_buf = String::new();

    for block in blocks {
        let would_be = if current_buf.is_empty() {
            block.len()
        } else {
            current_buf.len() + 2 + block.len()
        };

        if would_be > max_chars && !current_buf.is_empty() {
            push_chunk(&mut chunks, &current_buf);
            current_buf.clear();
        }

        if block.len() > max_chars {
            let mut remaining = block.as_str();
            while !remaining.is_empty() {
                let split_at = hard_split_point(remaining, max_chars);
                let piece = remaining[..split_at].trim();
                if !piece.is_empty() {
                    push_chunk(&mut chunks, piece);
                }
                remaining = &remaining[split_at..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(&block);
        }
    }

    if !current_buf.is_empty() {
        push_chunk(&mut chunks, &current_buf);
    }

    chunks
}

/// Split into trimmed, non-empty blocks at blank lines, and before
/// headings when `headings` is set.
fn split_blocks(text: &str, headings: bool) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            flush_block(&mut blocks, &mut current);
            continue;
        }
        if headings && is_heading(trimmed) {
            flush_block(&mut blocks, &mut current);
        }
        current.push(trimmed);
    }
    flush_block(&mut blocks, &mut current);
    blocks
}

fn flush_block(blocks: &mut Vec<String>, current: &mut Vec<&str>) {
    if current.is_empty() {
        return;
    }
    let joined = current.join("\n");
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        blocks.push(trimmed.to_string());
    }
    current.clear();
}

pub(crate) fn is_heading(line: &str) -> bool {
    let line = line.trim_start();
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// Byte offset at which to cut `s` so the head fits in `max_chars`.
///
/// Always returns a char boundary greater than zero for non-empty `s`.
fn hard_split_point(s: &str, max_chars: usize) -> usize {
    if s.len() <= max_chars {
        return s.len();
    }
    let limit = snap_to_char_boundary(s, max_chars);
    let head = &s[..limit];

    let sentence_end = [". ", "! ", "? ", ".\n", "!\n", "?\n"]
        .iter()
        .filter_map(|p| head.rfind(p).map(|pos| pos + 1))
        .max();
    let cut = sentence_end
        .or_else(|| head.rfind('\n').map(|pos| pos + 1))
        .or_else(|| head.rfind(' ').map(|pos| pos + 1))
        .unwrap_or(limit);

    if cut == 0 {
        // Wider than max_chars and no boundary: take one code point.
        s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len())
    } else {
        cut
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: &str) {
    let index = chunks.len();
    chunks.push(Chunk {
        index,
        text: text.to_string(),
        hash: content_hash(text),
    });
}

/// SHA-256 of `text`, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
