use crate::error::IngestError;
use crate::models::{Chunk, Document};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// Split points tried in order; the empty separator is the hard character cut.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if chunk_overlap > chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {chunk_overlap} is larger than chunk size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

/// Splits text on paragraph, line and word boundaries before falling back
/// to character cuts, then greedily merges the pieces into overlapping windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
}

impl RecursiveSplitter {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    /// Chunks paired with the character offset at which each starts in `text`.
    pub fn split_with_offsets(&self, text: &str) -> Vec<(usize, String)> {
        let char_starts: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
        let to_byte = |chars: usize| char_starts.get(chars).copied().unwrap_or(text.len());
        let to_chars = |byte: usize| char_starts.partition_point(|&start| start < byte);

        let mut located = Vec::new();
        let mut previous_start = 0usize;
        let mut previous_len = 0usize;

        for chunk in self.split_text(text) {
            let search_from = (previous_start + previous_len).saturating_sub(self.config.chunk_overlap);
            let from_byte = to_byte(search_from);
            let start = text[from_byte..]
                .find(chunk.as_str())
                .map(|position| to_chars(from_byte + position))
                .or_else(|| text.find(chunk.as_str()).map(to_chars))
                .unwrap_or(search_from);

            previous_start = start;
            previous_len = char_len(&chunk);
            located.push((start, chunk));
        }

        located
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = "";
        let mut finer: &[&str] = &[];
        for (position, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[position + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }

        chunks.retain(|chunk| !chunk.is_empty());
        chunks
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.config.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_trimmed(&window) {
                    merged.push(chunk);
                }

                while total > self.config.chunk_overlap
                    || (total > 0 && total + len > self.config.chunk_size)
                {
                    match window.pop_front() {
                        Some(dropped) => total -= char_len(dropped),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_trimmed(&window) {
            merged.push(chunk);
        }

        merged
    }
}

/// Splits on `separator`, keeping each separator at the start of the piece that follows it.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        pieces.push(&text[start..position]);
        start = position;
    }
    pieces.push(&text[start..]);
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn join_trimmed(window: &VecDeque<&str>) -> Option<String> {
    let joined = window.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn chunk_document(document: &Document, config: ChunkingConfig) -> Vec<Chunk> {
    RecursiveSplitter::new(config)
        .split_with_offsets(&document.content)
        .into_iter()
        .enumerate()
        .map(|(index, (start_offset, text))| Chunk {
            chunk_id: make_chunk_id(&document.id, index as u64, &text),
            document_id: document.id.clone(),
            source_name: document.name.clone(),
            chunk_index: index as u64,
            start_offset,
            text,
        })
        .collect()
}

fn make_chunk_id(document_id: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
