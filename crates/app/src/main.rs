mod error;
mod routes;
mod state;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use docqa_core::completion::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use docqa_core::{
    load_documents_from_folder, AnswerCoordinator, AnswerSettings, ChunkingConfig,
    CompletionClient, DocumentStore, EmbedderKind, GroqClient, GroqConfig, IndexState,
    KnowledgeBase, LopdfExtractor, SamplingParams, UploadDir,
};
use state::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa-server", version, about = "Question answering over a folder of PDF documents")]
struct Cli {
    /// Address to bind
    #[arg(long, env = "DOCQA_HOST", default_value = "127.0.0.1")]
    host: String,

    #[arg(long, env = "DOCQA_PORT", default_value_t = 8000)]
    port: u16,

    /// Folder holding the PDF library; uploads are written here too
    #[arg(long, env = "DOCQA_PDF_DIR", default_value = "pdfs")]
    pdf_dir: PathBuf,

    /// Folder holding the persisted vector index
    #[arg(long, env = "DOCQA_INDEX_DIR", default_value = "vector_index")]
    index_dir: PathBuf,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    groq_api_key: String,

    #[arg(long, env = "GROQ_BASE_URL", default_value = DEFAULT_BASE_URL)]
    groq_base_url: String,

    /// Chat model served by the completion endpoint
    #[arg(long, env = "DOCQA_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    #[arg(long, default_value_t = 1024)]
    max_tokens: u32,

    #[arg(long, default_value_t = 1.0)]
    top_p: f32,

    /// Chunks retrieved per chat question
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Characters of a document sent in whole-document mode
    #[arg(long, default_value_t = 10_000)]
    document_char_budget: usize,

    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,

    /// Embedding model: minilm or ngram
    #[arg(long, env = "DOCQA_EMBEDDER", default_value = "minilm")]
    embedder: EmbedderKind,

    /// Allowed browser origins
    #[arg(
        long = "cors-origin",
        env = "DOCQA_CORS_ORIGINS",
        value_delimiter = ',',
        default_values = ["http://localhost:5173", "http://127.0.0.1:5173"]
    )]
    cors_origins: Vec<String>,

    /// Largest accepted upload request body, in bytes
    #[arg(long, default_value_t = 50 * 1024 * 1024)]
    max_upload_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("docqa_server=info,docqa_core=info,tower_http=info")),
        )
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    if cli.groq_api_key.trim().is_empty() {
        bail!("GROQ_API_KEY is empty; set it in the environment or pass --groq-api-key");
    }

    let chunking = ChunkingConfig::new(cli.chunk_size, cli.chunk_overlap)
        .context("invalid chunking parameters")?;

    let extractor = Arc::new(LopdfExtractor);
    let documents = DocumentStore::new();
    let report = load_documents_from_folder(&documents, &cli.pdf_dir, extractor.as_ref())
        .with_context(|| format!("failed to read PDF folder {}", cli.pdf_dir.display()))?;
    for skipped in &report.skipped_files {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "pdf not loaded");
    }

    let embedder = cli.embedder.build().context("failed to load embedding model")?;
    let knowledge = Arc::new(KnowledgeBase::new(embedder, chunking, &cli.index_dir));
    let index_state = knowledge.initialize(&report.loaded).with_context(|| {
        format!("failed to prepare vector index at {}", cli.index_dir.display())
    })?;
    match index_state {
        IndexState::Loaded { entries } => info!(entries, "vector index loaded"),
        IndexState::Built { entries } => info!(entries, "vector index built"),
        IndexState::Empty => warn!("no documents indexed; /chat is unavailable until a PDF is uploaded"),
    }

    let completion: Box<dyn CompletionClient> = Box::new(
        GroqClient::new(GroqConfig {
            base_url: cli.groq_base_url.clone(),
            api_key: cli.groq_api_key.clone(),
        })
        .context("failed to configure completion client")?,
    );

    let settings = AnswerSettings {
        model: cli.model.clone(),
        sampling: SamplingParams {
            temperature: cli.temperature,
            max_tokens: cli.max_tokens,
            top_p: cli.top_p,
        },
        top_k: cli.top_k,
        document_char_budget: cli.document_char_budget,
    };

    let coordinator = AnswerCoordinator::new(
        completion,
        documents,
        knowledge,
        extractor,
        UploadDir::new(&cli.pdf_dir),
        settings,
    );
    let state = AppState::new(coordinator);

    let cors = routes::cors_layer(&cli.cors_origins).context("invalid CORS origin")?;
    let app = routes::router(state, cors, cli.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cli.host, cli.port))?;
    let addr = listener.local_addr()?;

    info!(
        %addr,
        documents = report.loaded.len(),
        started_at = %Utc::now().to_rfc3339(),
        version = env!("CARGO_PKG_VERSION"),
        "docqa server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("docqa server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for shutdown signal");
    }
}
