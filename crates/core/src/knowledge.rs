//! Retrieval side of the knowledge base: chunk, embed, index and search.

use crate::chunking::{chunk_document, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::index::{FlatVectorIndex, IndexEntry};
use crate::traits::VectorIndex;
use crate::{Document, SearchError, SearchHit};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Loaded { entries: usize },
    Built { entries: usize },
    /// Nothing on disk and nothing to index yet.
    Empty,
}

pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    index_dir: PathBuf,
    index: RwLock<Option<Arc<FlatVectorIndex>>>,
    write_guard: Mutex<()>,
}

impl KnowledgeBase {
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            embedder,
            chunking,
            index_dir: index_dir.into(),
            index: RwLock::new(None),
            write_guard: Mutex::new(()),
        }
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    pub fn is_ready(&self) -> bool {
        self.index.read().is_some()
    }

    pub fn indexed_chunks(&self) -> usize {
        self.index.read().as_ref().map_or(0, |index| index.len())
    }

    /// Loads the persisted index, or builds one from `documents` when none exists.
    ///
    /// Any error here means the index on disk is unusable and the caller
    /// should refuse to serve retrieval traffic.
    pub fn initialize(&self, documents: &[Document]) -> Result<IndexState, SearchError> {
        let _guard = self.write_guard.lock();

        if FlatVectorIndex::exists(&self.index_dir) {
            let index = FlatVectorIndex::load(&self.index_dir)?;
            if index.embedder() != self.embedder.name() {
                return Err(SearchError::EmbedderMismatch {
                    stored: index.embedder().to_string(),
                    current: self.embedder.name().to_string(),
                });
            }
            let entries = index.len();
            *self.index.write() = Some(Arc::new(index));
            return Ok(IndexState::Loaded { entries });
        }

        info!(dir = %self.index_dir.display(), "vector index not found, building from documents");
        let entries = self.embed_documents(documents)?;
        if entries.is_empty() {
            warn!("no documents with text to index; retrieval stays unavailable until an upload");
            return Ok(IndexState::Empty);
        }

        let index = FlatVectorIndex::build(entries, self.embedder.name(), self.embedder.dimensions())?;
        index.save(&self.index_dir)?;
        let entries = index.len();
        info!(entries, dir = %self.index_dir.display(), "vector index built and saved");

        *self.index.write() = Some(Arc::new(index));
        Ok(IndexState::Built { entries })
    }

    /// Adds one document's chunks to the live index (creating it if needed) and persists it.
    pub fn index_document(&self, document: &Document) -> Result<usize, SearchError> {
        let entries = self.embed_documents(std::slice::from_ref(document))?;
        let added = entries.len();
        if added == 0 {
            return Ok(0);
        }

        let _guard = self.write_guard.lock();
        let current = self.index.read().clone();
        let updated = match current {
            Some(existing) => {
                let mut index = FlatVectorIndex::clone(&existing);
                index.append(entries)?;
                index
            }
            None => FlatVectorIndex::build(entries, self.embedder.name(), self.embedder.dimensions())?,
        };

        updated.save(&self.index_dir)?;
        *self.index.write() = Some(Arc::new(updated));

        info!(document = %document.id, chunks = added, "document indexed");
        Ok(added)
    }

    pub async fn search(&self, question: &str, k: usize) -> Result<Option<Vec<SearchHit>>, SearchError> {
        let Some(index) = self.index.read().clone() else {
            return Ok(None);
        };

        let embedder = Arc::clone(&self.embedder);
        let question = question.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed(&question))
            .await
            .map_err(|error| SearchError::Task(error.to_string()))??;
        let hits = index.search_vector(&query_vector, k).await?;
        Ok(Some(hits))
    }

    fn embed_documents(&self, documents: &[Document]) -> Result<Vec<IndexEntry>, SearchError> {
        let chunks: Vec<_> = documents
            .iter()
            .flat_map(|document| chunk_document(document, self.chunking))
            .collect();
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use tempfile::tempdir;

    fn knowledge_base(dir: &Path) -> KnowledgeBase {
        KnowledgeBase::new(
            Arc::new(CharacterNgramEmbedder::default()),
            ChunkingConfig::default(),
            dir.join("vector_index"),
        )
    }

    #[tokio::test]
    async fn empty_library_leaves_retrieval_unavailable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let kb = knowledge_base(dir.path());

        assert_eq!(kb.initialize(&[])?, IndexState::Empty);
        assert!(!kb.is_ready());
        assert!(kb.search("dosage", 5).await?.is_none());
        assert!(!FlatVectorIndex::exists(kb.index_dir()));
        Ok(())
    }

    #[tokio::test]
    async fn index_is_built_once_then_loaded() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let documents = vec![
            Document::new("dosing", "dosing.pdf", "Administer 500mg every 8 hours."),
            Document::new("malaria", "malaria.pdf", "Artemether is first line for malaria."),
        ];

        let kb = knowledge_base(dir.path());
        assert_eq!(kb.initialize(&documents)?, IndexState::Built { entries: 2 });

        let reloaded = knowledge_base(dir.path());
        assert_eq!(reloaded.initialize(&[])?, IndexState::Loaded { entries: 2 });

        let hits = reloaded.search("Administer 500mg every 8 hours", 1).await?.unwrap_or_default();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.source_name, "dosing.pdf");
        Ok(())
    }

    #[tokio::test]
    async fn uploaded_documents_become_searchable() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let kb = knowledge_base(dir.path());
        kb.initialize(&[])?;

        let added = kb.index_document(&Document::new("tb", "tb.pdf", "Tuberculosis regimen lasts six months."))?;
        assert_eq!(added, 1);
        assert!(kb.is_ready());
        assert!(FlatVectorIndex::exists(kb.index_dir()));

        kb.index_document(&Document::new("hiv", "hiv.pdf", "Antiretroviral therapy starts at diagnosis."))?;
        assert_eq!(kb.indexed_chunks(), 2);
        assert_eq!(FlatVectorIndex::load(kb.index_dir())?.len(), 2);
        Ok(())
    }

    #[test]
    fn index_from_another_embedder_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        knowledge_base(dir.path()).initialize(&[Document::new("a", "a.pdf", "alpha text")])?;

        let other = KnowledgeBase::new(
            Arc::new(OtherEmbedder),
            ChunkingConfig::default(),
            dir.path().join("vector_index"),
        );
        assert!(matches!(
            other.initialize(&[]),
            Err(SearchError::EmbedderMismatch { .. })
        ));
        Ok(())
    }

    struct OtherEmbedder;

    impl Embedder for OtherEmbedder {
        fn name(&self) -> &str {
            "other"
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, SearchError> {
            Ok(vec![0.0; 4])
        }
    }
}
