use crate::error::{FileragError, Result};
use crate::index::RetrievableUnit;
use super::parsers::ParsedDocument;
use std::collections::VecDeque;

/// Separators tried in order: paragraph, line, word, character
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter with overlap
///
/// Splits on the largest structural boundary present in the text, merges the
/// pieces greedily up to `chunk_size` characters, and carries up to
/// `chunk_overlap` characters of trailing pieces into the next chunk. Pieces
/// that are still too long are split again with the next separator.
///
/// Lengths are measured in characters (Unicode scalar values), never bytes.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(FileragError::Config("chunk_size must be greater than 0".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(FileragError::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into trimmed, non-empty chunks
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split text and pair each chunk with its character offset in `text`
    pub fn split_with_offsets(&self, text: &str) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        let mut index = 0usize;
        let mut previous_len = 0usize;

        for chunk in self.split_text(text) {
            let search_from = (index + previous_len).saturating_sub(self.chunk_overlap);
            index = find_char_offset(text, &chunk, search_from)
                .or_else(|| find_char_offset(text, &chunk, 0))
                .unwrap_or(search_from);
            previous_len = chunk.chars().count();
            out.push((index, chunk));
        }

        out
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();
        let (separator, remaining) = pick_separator(text, separators);

        let mut good_splits: Vec<String> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if char_len(&piece) <= self.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedily merge small pieces into chunks of at most `chunk_size` characters.
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);

            if total + len > self.chunk_size && !current.is_empty() {
                push_trimmed(&mut docs, &current);

                // Keep at most `chunk_overlap` characters as the head of the next chunk
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_trimmed(&mut docs, &current);
        docs
    }
}

/// Chunk every span of a parsed document into retrievable units for `file_id`
pub fn chunk_document(parsed: &ParsedDocument, file_id: &str, splitter: &TextSplitter) -> Vec<RetrievableUnit> {
    let mut units = Vec::new();

    for span in &parsed.spans {
        for (start_index, text) in splitter.split_with_offsets(&span.text) {
            units.push(RetrievableUnit {
                text,
                file_id: file_id.to_string(),
                file_type: parsed.kind,
                source: span.source.clone(),
                page: span.page,
                start_index,
            });
        }
    }

    units
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn push_trimmed(docs: &mut Vec<String>, pieces: &VecDeque<&str>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// First separator present in `text`, plus the finer separators after it.
fn pick_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (separator, &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator, &separators[i + 1..]);
        }
    }
    (separators.last().map(String::as_str).unwrap_or(""), &[])
}

/// Split on `separator`, re-attaching it to the start of each following piece
/// so that concatenating the pieces reproduces `text`.
fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut pieces = Vec::new();
    let mut parts = text.split(separator);
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            pieces.push(first.to_string());
        }
    }
    for part in parts {
        pieces.push(format!("{}{}", separator, part));
    }
    pieces
}

/// Character offset of `needle` in `haystack`, searching from character `from`.
fn find_char_offset(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let start_byte = haystack
        .char_indices()
        .nth(from)
        .map(|(b, _)| b)
        .unwrap_or(haystack.len());
    let found = haystack.get(start_byte..)?.find(needle)?;
    Some(char_len(&haystack[..start_byte + found]))
}
