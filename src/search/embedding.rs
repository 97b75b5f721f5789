//! Embedding providers for the semantic channel
//!
//! The engine only depends on the [`Embedder`] trait. [`FastEmbedder`] runs
//! a local ONNX sentence-embedding model; [`HashingEmbedder`] is a
//! deterministic, dependency-free provider for offline use and tests.

use std::sync::Arc;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use super::tokenizer::tokenize;
use super::vector::l2_normalize;
use crate::error::{Result, SearchError};

/// Model name that selects [`HashingEmbedder`]
pub const HASHING_MODEL: &str = "hashing";

/// Text to fixed-dimension, L2-normalized vector
pub trait Embedder: Send + Sync {
    /// Identity and version of the model, recorded with each generation
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts; the default embeds them one by one
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Resolve a configured model name to a provider
pub fn embedder_for_model(model: &str) -> Result<Arc<dyn Embedder>> {
    if model.eq_ignore_ascii_case(HASHING_MODEL) {
        return Ok(Arc::new(HashingEmbedder::default()));
    }
    Ok(Arc::new(FastEmbedder::with_model_name(model)?))
}

/// Sentence-embedding model running through fastembed
pub struct FastEmbedder {
    model: TextEmbedding,
    model_id: String,
    dimension: usize,
}

impl FastEmbedder {
    /// Create an embedder for a model given by its hub name
    pub fn with_model_name(name: &str) -> Result<Self> {
        let (model_name, dimension) = resolve_model(name)?;
        info!("Initializing embedding model: {} ({:?})", name, model_name);

        let mut options = InitOptions::default();
        options.model_name = model_name;
        options.show_download_progress = true;

        let model = TextEmbedding::try_new(options).map_err(|e| {
            SearchError::Embedding(format!("Failed to initialize embedding model: {e}"))
        })?;

        Ok(Self {
            model,
            model_id: name.to_string(),
            dimension,
        })
    }
}

fn resolve_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    let resolved = match name.to_ascii_lowercase().as_str() {
        "sentence-transformers/all-minilm-l6-v2" | "all-minilm-l6-v2" => {
            (EmbeddingModel::AllMiniLML6V2, 384)
        }
        "baai/bge-small-en-v1.5" | "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384),
        "baai/bge-base-en-v1.5" | "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768),
        "intfloat/multilingual-e5-small" | "multilingual-e5-small" => {
            (EmbeddingModel::MultilingualE5Small, 384)
        }
        "intfloat/multilingual-e5-base" | "multilingual-e5-base" => {
            (EmbeddingModel::MultilingualE5Base, 768)
        }
        other => {
            return Err(SearchError::Config(format!(
                "Unsupported embedding model: {other}"
            )))
        }
    };
    Ok(resolved)
}

impl Embedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| SearchError::Embedding("No embedding generated".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| SearchError::Embedding(format!("Failed to generate embeddings: {e}")))?;
        for embedding in &mut embeddings {
            l2_normalize(embedding);
        }
        Ok(embeddings)
    }
}

/// Feature-hashing embedder: token counts folded into a fixed number of buckets
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        HASHING_MODEL
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimension];
        for token in tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        l2_normalize(&mut vector);
        Ok(vector)
    }
}

// Stable across platforms and runs, unlike std's RandomState.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::vector::dot;

    #[test]
    fn test_hashing_embedder_is_normalized_and_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Concrete bridge repair").unwrap();
        let b = embedder.embed("concrete BRIDGE repair").unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_similarity() {
        let embedder = HashingEmbedder::default();
        let query = embedder.embed("sandstone masonry").unwrap();
        let close = embedder.embed("historic sandstone masonry restoration").unwrap();
        let far = embedder.embed("timber framing").unwrap();
        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[test]
    fn test_blank_text_embeds_to_zero() {
        let embedder = HashingEmbedder::default();
        assert!(embedder.embed("  ").unwrap().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_batch_matches_single() {
        let embedder = HashingEmbedder::default();
        let batch = embedder.embed_batch(&["steel", "glass"]).unwrap();
        assert_eq!(batch[1], embedder.embed("glass").unwrap());
    }

    #[test]
    fn test_model_resolution() {
        assert_eq!(embedder_for_model("hashing").unwrap().model_id(), HASHING_MODEL);
        assert!(matches!(
            resolve_model("no-such-model"),
            Err(SearchError::Config(_))
        ));
        assert_eq!(
            resolve_model("sentence-transformers/all-MiniLM-L6-v2").unwrap().1,
            384
        );
    }

    #[test]
    #[ignore] // Requires model download
    fn test_fastembed_generation() {
        let embedder = FastEmbedder::with_model_name("sentence-transformers/all-MiniLM-L6-v2").unwrap();
        let embedding = embedder.embed("Structural engineer, bridges").unwrap();
        assert_eq!(embedding.len(), embedder.dimension());
        assert!((dot(&embedding, &embedding) - 1.0).abs() < 1e-4);
    }
}
