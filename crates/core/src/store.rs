use crate::models::{Document, DocumentSummary};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// In-memory document registry shared by every request handler.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Arc<RwLock<HashMap<String, Document>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the entry for `id`.
    pub fn add(&self, id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) {
        self.insert(Document::new(id, name, content));
    }

    pub fn insert(&self, document: Document) {
        info!(id = %document.id, name = %document.name, "document added to knowledge base");
        self.documents.write().insert(document.id.clone(), document);
    }

    /// Content of `id`, or an empty string when it is unknown.
    pub fn get(&self, id: &str) -> String {
        self.documents
            .read()
            .get(id)
            .map(|document| document.content.clone())
            .unwrap_or_default()
    }

    pub fn document(&self, id: &str) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<DocumentSummary> {
        self.documents.read().values().map(Document::summary).collect()
    }

    pub fn documents(&self) -> Vec<Document> {
        self.documents.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}
