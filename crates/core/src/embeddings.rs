use crate::error::SearchError;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Width of the trigram embedder unless configured otherwise.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

/// Output width of all-MiniLM-L6-v2.
pub const MINILM_DIMENSIONS: usize = 384;

pub trait Embedder: Send + Sync {
    /// Stable identifier persisted with an index so a mismatched model is caught on load.
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Sentence-transformers all-MiniLM-L6-v2 through fastembed's ONNX runtime.
pub struct MiniLmEmbedder {
    model: Mutex<TextEmbedding>,
}

impl MiniLmEmbedder {
    pub const NAME: &'static str = "sentence-transformers/all-MiniLM-L6-v2";

    /// Loads the model; the first call downloads weights into fastembed's cache.
    pub fn load() -> Result<Self, SearchError> {
        info!(model = Self::NAME, "loading embedding model");
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
        )
        .map_err(|error| SearchError::Embedding(error.to_string()))?;
        info!(model = Self::NAME, "embedding model ready");

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for MiniLmEmbedder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn dimensions(&self) -> usize {
        MINILM_DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("model returned no vector".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self
            .model
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(|error| SearchError::Embedding(error.to_string()))?;

        if vectors.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "model returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }

        Ok(vectors)
    }
}

/// Hashed character-trigram embedder. Deterministic and model-free.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl CharacterNgramEmbedder {
    pub const NAME: &'static str = "character-trigram";
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for CharacterNgramEmbedder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let width = self.dimensions.max(1);
        let mut vector = vec![0f32; width];
        let chars: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

        for trigram in chars.windows(3) {
            let bucket = (trigram_hash(trigram) % width as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        Ok(vector)
    }
}

/// 64-bit FNV-1a over the UTF-8 bytes of the trigram.
fn trigram_hash(trigram: &[char]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    let mut buffer = [0u8; 4];
    for ch in trigram {
        for byte in ch.encode_utf8(&mut buffer).bytes() {
            hash = (hash ^ u64::from(byte)).wrapping_mul(PRIME);
        }
    }
    hash
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedderKind {
    #[default]
    MiniLm,
    Ngram,
}

impl EmbedderKind {
    pub fn build(self) -> Result<Arc<dyn Embedder>, SearchError> {
        match self {
            EmbedderKind::MiniLm => Ok(Arc::new(MiniLmEmbedder::load()?)),
            EmbedderKind::Ngram => Ok(Arc::new(CharacterNgramEmbedder::default())),
        }
    }
}

impl FromStr for EmbedderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minilm" | "all-minilm-l6-v2" => Ok(EmbedderKind::MiniLm),
            "ngram" | "trigram" => Ok(EmbedderKind::Ngram),
            other => Err(format!("unknown embedder `{other}` (expected minilm or ngram)")),
        }
    }
}
