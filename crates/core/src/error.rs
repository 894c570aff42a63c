use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("embedding model failed: {0}")]
    Embedding(String),

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("cannot build an index from an empty chunk set")]
    EmptyInput,

    #[error("vector index not found at {0}")]
    IndexMissing(String),

    #[error("index was built with embedder `{stored}`, current embedder is `{current}`")]
    EmbedderMismatch { stored: String, current: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("completion service returned {status}: {details}")]
    Service { status: u16, details: String },

    #[error("completion service returned no choices")]
    EmptyResponse,
}

/// Failures surfaced by the question-answering operations.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("knowledge base is not initialized")]
    NotReady,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}
