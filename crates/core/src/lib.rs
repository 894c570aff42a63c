pub mod chunking;
pub mod completion;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod knowledge;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod store;
pub mod traits;

pub use chunking::{chunk_document, ChunkingConfig, RecursiveSplitter};
pub use completion::{CompletionRequest, GroqClient, GroqConfig, SamplingParams};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, EmbedderKind, MiniLmEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{CompletionError, IngestError, QueryError, SearchError};
pub use extractor::{extract_pdf_text, LopdfExtractor, PageText, PdfExtractor};
pub use index::{FlatVectorIndex, IndexEntry};
pub use ingest::{
    discover_pdf_files, display_name, is_pdf_name, load_documents_from_folder, IngestionReport, SkippedPdf,
    UploadDir,
};
pub use knowledge::{IndexState, KnowledgeBase};
pub use models::{ChatAnswer, Chunk, Document, DocumentSummary, SearchHit, UploadOutcome};
pub use orchestrator::{AnswerCoordinator, AnswerSettings};
pub use store::DocumentStore;
pub use traits::{CompletionClient, VectorIndex};
