//! Overlapping document chunking with natural break preference
//!
//! Large documents are split into fixed-size windows that overlap so
//! context spanning a boundary appears in both chunks. Cut points
//! prefer a paragraph break in the last fifth of the window, then a
//! sentence break in the last two fifths, then a hard cut.

use serde::{Deserialize, Serialize};

/// One slice of a document, processed independently and merged later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Zero-based position in the chunk sequence
    pub index: usize,
    /// Byte offset of the chunk within the original document
    pub start: usize,
    /// The chunk's text
    pub text: String,
}

/// Splits documents into overlapping chunks
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker; `overlap` must be smaller than `chunk_size`
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Split `text` into chunks. A document no larger than one chunk
    /// comes back whole.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.len() <= self.chunk_size {
            return vec![Chunk {
                index: 0,
                start: 0,
                text: text.to_string(),
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < text.len() {
            let hard_end = floor_boundary(text, (start + self.chunk_size).min(text.len()));
            let mut end = if hard_end < text.len() {
                self.natural_break(text, start, hard_end)
            } else {
                hard_end
            };
            // A window smaller than the character at `start` would pin
            // the cut to `start`; always advance by at least one char.
            if end <= start {
                end = ceil_boundary(text, start + 1);
            }

            chunks.push(Chunk {
                index,
                start,
                text: text[start..end].to_string(),
            });
            index += 1;

            if end >= text.len() {
                break;
            }
            let mut next = end.saturating_sub(self.overlap);
            if next <= start {
                next = end;
            }
            start = ceil_boundary(text, next);
        }

        chunks
    }

    /// Pick a cut point at or before `hard_end`, preferring a paragraph
    /// break in the last fifth of the window, then a sentence break in
    /// the last two fifths.
    fn natural_break(&self, text: &str, start: usize, hard_end: usize) -> usize {
        let window_len = hard_end - start;

        let para_from = ceil_boundary(text, hard_end - window_len / 5);
        if let Some(pos) = text[para_from..hard_end].rfind("\n\n") {
            return para_from + pos + 2;
        }

        let sentence_from = ceil_boundary(text, hard_end - window_len * 2 / 5);
        let tail = &text[sentence_from..hard_end];
        if let Some(pos) = tail.rfind(". ").or_else(|| tail.rfind(".\n")) {
            return sentence_from + pos + 2;
        }

        hard_end
    }
}

/// Largest char boundary at or below `index`
fn floor_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Smallest char boundary at or above `index`
fn ceil_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
