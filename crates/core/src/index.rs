//! Persisted flat vector index.
//!
//! Every (vector, chunk) pair lives in memory and is scored exhaustively
//! with cosine similarity. The whole index is serialized as one JSON file
//! inside its directory.

use crate::error::SearchError;
use crate::models::{Chunk, SearchHit};
use crate::traits::VectorIndex;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatVectorIndex {
    embedder: String,
    dimensions: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl FlatVectorIndex {
    pub fn build(
        entries: Vec<IndexEntry>,
        embedder: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, SearchError> {
        if entries.is_empty() {
            return Err(SearchError::EmptyInput);
        }
        check_dimensions(&entries, dimensions)?;

        let now = Utc::now();
        Ok(Self {
            embedder: embedder.into(),
            dimensions,
            created_at: now,
            updated_at: now,
            entries,
        })
    }

    /// An index is considered present once its directory exists and holds anything.
    pub fn exists(dir: &Path) -> bool {
        fs::read_dir(dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    pub fn load(dir: &Path) -> Result<Self, SearchError> {
        let path = dir.join(INDEX_FILE);
        if !path.is_file() {
            return Err(SearchError::IndexMissing(path.display().to_string()));
        }

        let bytes = fs::read(&path)?;
        let index: Self = serde_json::from_slice(&bytes)?;
        check_dimensions(&index.entries, index.dimensions)?;

        info!(
            path = %path.display(),
            entries = index.entries.len(),
            embedder = %index.embedder,
            "vector index loaded"
        );
        Ok(index)
    }

    pub fn save(&self, dir: &Path) -> Result<(), SearchError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(INDEX_FILE);
        let tmp = dir.join(format!("{INDEX_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, &path)?;

        debug!(path = %path.display(), entries = self.entries.len(), "vector index saved");
        Ok(())
    }

    pub fn append(&mut self, entries: Vec<IndexEntry>) -> Result<(), SearchError> {
        check_dimensions(&entries, self.dimensions)?;
        self.entries.extend(entries);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn embedder(&self) -> &str {
        &self.embedder
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `k` nearest chunks, most similar first.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchHit>, SearchError> {
        if query_vector.len() != self.dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (cosine_similarity(query_vector, &entry.vector), entry))
            .collect();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, entry)| SearchHit {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

#[async_trait]
impl VectorIndex for FlatVectorIndex {
    async fn search_vector(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        self.search(query_vector, k)
    }
}

fn check_dimensions(entries: &[IndexEntry], expected: usize) -> Result<(), SearchError> {
    match entries.iter().find(|entry| entry.vector.len() != expected) {
        Some(entry) => Err(SearchError::DimensionMismatch {
            expected,
            actual: entry.vector.len(),
        }),
        None => Ok(()),
    }
}

fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn entry(document: &str, index: u64, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                chunk_id: format!("{document}-{index}"),
                document_id: document.to_string(),
                source_name: format!("{document}.pdf"),
                chunk_index: index,
                start_offset: 0,
                text: format!("chunk {index} of {document}"),
            },
            vector,
        }
    }

    fn sample_index() -> FlatVectorIndex {
        FlatVectorIndex::build(
            vec![
                entry("a", 0, vec![1.0, 0.0, 0.0]),
                entry("a", 1, vec![0.7, 0.7, 0.0]),
                entry("b", 0, vec![0.0, 1.0, 0.0]),
                entry("b", 1, vec![0.0, 0.0, 1.0]),
            ],
            "test",
            3,
        )
        .expect("index builds")
    }

    #[test]
    fn build_rejects_empty_input() {
        let result = FlatVectorIndex::build(Vec::new(), "test", 3);
        assert!(matches!(result, Err(SearchError::EmptyInput)));
    }

    #[test]
    fn build_rejects_wrong_dimensions() {
        let result = FlatVectorIndex::build(vec![entry("a", 0, vec![1.0, 0.0])], "test", 3);
        assert!(matches!(result, Err(SearchError::DimensionMismatch { .. })));
    }

    #[test]
    fn search_returns_at_most_k_in_descending_similarity() {
        let index = sample_index();
        let hits = index.search(&[1.0, 0.2, 0.0], 3).unwrap();

        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.chunk_id, "a-0");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        assert_eq!(index.search(&[1.0, 0.0, 0.0], 10).unwrap().len(), 4);
        assert!(index.search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn search_rejects_query_of_wrong_width() {
        let index = sample_index();
        assert!(index.search(&[1.0], 2).is_err());
    }

    #[test]
    fn saved_index_is_reloaded() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index_dir = dir.path().join("vector_index");
        assert!(!FlatVectorIndex::exists(&index_dir));

        let mut index = sample_index();
        index.append(vec![entry("c", 0, vec![0.5, 0.5, 0.5])])?;
        index.save(&index_dir)?;
        assert!(FlatVectorIndex::exists(&index_dir));

        let loaded = FlatVectorIndex::load(&index_dir)?;
        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded.embedder(), "test");
        assert_eq!(loaded.dimensions(), 3);
        Ok(())
    }

    #[test]
    fn load_fails_for_missing_or_corrupt_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(matches!(
            FlatVectorIndex::load(dir.path()),
            Err(SearchError::IndexMissing(_))
        ));

        fs::write(dir.path().join(INDEX_FILE), b"{not json")?;
        assert!(matches!(
            FlatVectorIndex::load(dir.path()),
            Err(SearchError::Serialization(_))
        ));
        Ok(())
    }
}
