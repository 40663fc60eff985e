//! Sentence-aligned text chunking
//!
//! All positions are character indices, never byte offsets.

use crate::config::PipelineSettings;

/// Splits text into overlapping, sentence-aligned chunks
#[derive(Debug, Clone)]
pub struct TextChunker {
    min_length: usize,
    max_length: usize,
    overlap: usize,
    max_chunks: usize,
}

impl TextChunker {
    /// Create a new text chunker
    pub fn new(min_length: usize, max_length: usize, overlap: usize, max_chunks: usize) -> Self {
        Self {
            min_length,
            max_length: max_length.max(1),
            overlap,
            max_chunks,
        }
    }

    /// Chunker using the chunk settings of `settings`
    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self::new(
            settings.chunk_min_length,
            settings.chunk_max_length,
            settings.chunk_overlap,
            settings.max_chunks,
        )
    }

    /// Chunk the given text
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        if len <= self.max_length {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < len && chunks.len() < self.max_chunks {
            let mut end = (start + self.max_length).min(len);
            if end < len {
                let floor = (start + self.min_length.max(1)).min(end);
                end = sentence_boundary(&chars, floor, end)
                    .or_else(|| punctuation_boundary(&chars, floor, end))
                    .unwrap_or(end);
            }

            let slice: String = chars[start..end].iter().collect();
            let trimmed = slice.trim();
            if trimmed.chars().count() >= self.min_length {
                chunks.push(trimmed.to_string());
            }

            if end >= len {
                break;
            }
            let next = end.saturating_sub(self.overlap);
            start = if next > start { next } else { end };
        }
        chunks
    }
}

/// Last `[.!?]` + whitespace + uppercase, or blank line, in `floor..end`
fn sentence_boundary(chars: &[char], floor: usize, end: usize) -> Option<usize> {
    (floor..end).rev().find_map(|i| match chars[i] {
        '.' | '!' | '?' => {
            let next = skip_while(chars, i + 1, char::is_whitespace);
            (next > i + 1 && next < chars.len() && chars[next].is_uppercase()).then_some(i + 1)
        }
        '\n' => {
            let next = skip_while(chars, i + 1, |c| c != '\n' && c.is_whitespace());
            (next < chars.len() && chars[next] == '\n').then_some(i)
        }
        _ => None,
    })
}

/// Last punctuation followed by whitespace in `floor..end`
fn punctuation_boundary(chars: &[char], floor: usize, end: usize) -> Option<usize> {
    (floor..end).rev().find_map(|i| {
        let is_punct = matches!(chars[i], '.' | '!' | '?' | ';' | ':' | ',');
        let then_space = chars.get(i + 1).is_some_and(|c| c.is_whitespace());
        (is_punct && then_space).then_some(i + 1)
    })
}

fn skip_while(chars: &[char], from: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut i = from;
    while i < chars.len() && pred(chars[i]) {
        i += 1;
    }
    i
}
