//! Recursive character text splitter.
//!
//! Splits document text into overlapping [`Chunk`]s of at most
//! `chunk_size` characters. The splitter tries the coarsest separator
//! first (paragraphs), then falls back to lines, words, and finally single
//! characters for pieces that are still too large.
//!
//! # Algorithm
//!
//! 1. Pick the first separator in `["\n\n", "\n", " ", ""]` that occurs in
//!    the text (`""` always matches and splits into characters).
//! 2. Split on it. Pieces shorter than `chunk_size` are queued for merging;
//!    a piece that is too long flushes the queue and is split recursively
//!    with the remaining separators.
//! 3. Merging packs queued pieces, rejoined with their separator, into
//!    windows of at most `chunk_size` characters. When a window is emitted,
//!    pieces are dropped from its front until at most `chunk_overlap`
//!    characters remain; those carry over into the next window.
//! 4. Chunks are trimmed; empty chunks are discarded.
//!
//! Lengths are counted in `char`s, so multi-byte text is never cut inside
//! a code point.
//!
//! # Example
//!
//! ```rust
//! use socratic_rag_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("notes.md", "Hello world.\n\nSecond paragraph.", 800, 100);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Separators tried in order, coarsest first.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Split `text` into chunks and wrap each one in a [`Chunk`].
///
/// Returns an empty vector for empty or whitespace-only text. Indices are
/// contiguous from 0.
pub fn chunk_text(source: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    split_text(text, chunk_size, chunk_overlap)
        .iter()
        .enumerate()
        .map(|(i, piece)| make_chunk(source, i as i64, piece))
        .collect()
}

/// Split `text` into trimmed pieces of at most `chunk_size` characters.
///
/// A `chunk_size` of 0 is treated as 1.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let size = chunk_size.max(1);
    let overlap = chunk_overlap.min(size - 1);
    split_recursive(text, DEFAULT_SEPARATORS, size, overlap)
}

fn split_recursive(text: &str, separators: &[&str], size: usize, overlap: usize) -> Vec<String> {
    let sep_idx = separators
        .iter()
        .position(|s| s.is_empty() || text.contains(s))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(sep_idx).copied().unwrap_or("");
    let remaining = separators.get(sep_idx + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|p| !p.is_empty()).collect()
    };

    let mut out = Vec::new();
    let mut queued: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) < size {
            queued.push(piece);
            continue;
        }
        if !queued.is_empty() {
            out.extend(merge_pieces(&queued, separator, size, overlap));
            queued.clear();
        }
        if remaining.is_empty() {
            push_trimmed(&mut out, piece);
        } else {
            out.extend(split_recursive(piece, remaining, size, overlap));
        }
    }

    if !queued.is_empty() {
        out.extend(merge_pieces(&queued, separator, size, overlap));
    }

    out
}

/// Pack small pieces into overlapping windows of at most `size` characters.
fn merge_pieces(pieces: &[&str], separator: &str, size: usize, overlap: usize) -> Vec<String> {
    let sep_len = char_len(separator);
    let mut out = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);
        let joiner = if window.is_empty() { 0 } else { sep_len };

        if total + joiner + len > size && !window.is_empty() {
            push_joined(&mut out, &window, separator);

            // Keep at most `overlap` characters, and make room for `piece`.
            while let Some(front) = window.front() {
                let joiner = if window.is_empty() { 0 } else { sep_len };
                let too_long = total > overlap || (total + joiner + len > size && total > 0);
                if !too_long {
                    break;
                }
                let dropped = char_len(front) + if window.len() > 1 { sep_len } else { 0 };
                total = total.saturating_sub(dropped);
                window.pop_front();
            }
        }

        window.push_back(piece);
        total += len + if window.len() > 1 { sep_len } else { 0 };
    }

    push_joined(&mut out, &window, separator);
    out
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    push_trimmed(out, &joined);
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
pub fn make_chunk(source: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
