use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully extracted PDF held by the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    pub source_path: String,
    pub checksum: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn new(id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            content: content.into(),
            source_path: String::new(),
            checksum: None,
            ingested_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub source_name: String,
    pub chunk_index: u64,
    /// Character (not byte) offset of `text` inside the document content.
    pub start_offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatAnswer {
    pub response: String,
    pub context_sources: Vec<String>,
}

/// Outcome of handing one uploaded file to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Stored(DocumentSummary),
    Skipped { name: String, reason: String },
}
