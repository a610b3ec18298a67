/// Embedding provider trait and FastEmbed implementation
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    Initialization(String),

    #[error("Embedding generation failed: {0}")]
    Generation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Maps text to fixed-dimension vectors.
///
/// One provider serves both the corpus-build batch path and the
/// single-text query path. `embed_batch` must return exactly one vector
/// per input, in input order; the corpus relies on that alignment to map
/// vectors back to chunks.
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for multiple texts, order-preserving
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimension of every vector this provider produces
    fn dimension(&self) -> usize;

    /// Model identifier recorded in the corpus manifest
    fn model_name(&self) -> &str;
}

/// Zero-vector sentinel substituted when a single text cannot be embedded.
pub fn zero_vector(dimension: usize) -> Vec<f32> {
    vec![0.0; dimension]
}

/// Models accepted by `FastEmbedProvider::new`, with their dimensions.
const MODELS: &[(&str, EmbeddingModel, usize)] = &[
    ("all-MiniLM-L6-v2", EmbeddingModel::AllMiniLML6V2, 384),
    ("bge-small-en-v1.5", EmbeddingModel::BGESmallENV15, 384),
    ("bge-base-en-v1.5", EmbeddingModel::BGEBaseENV15, 768),
];

/// Canonical names of the supported local models.
pub fn supported_models() -> impl Iterator<Item = &'static str> {
    MODELS.iter().map(|(name, _, _)| *name)
}

/// FastEmbed provider for local embedding generation
///
/// Models are downloaded on demand to `~/.cache/huggingface/` on first
/// use; all-MiniLM-L6-v2 is ~90MB, bge-small-en-v1.5 ~130MB,
/// bge-base-en-v1.5 ~440MB. After that the provider runs fully offline.
pub struct FastEmbedProvider {
    model: TextEmbedding,
    model_name: &'static str,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a provider for `model_name` (case-insensitive lookup).
    ///
    /// The canonical spelling is what ends up in the corpus manifest, so
    /// bundles built from differently-cased config values stay compatible.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (canonical, embedding_model, dimension) = MODELS
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(model_name))
            .map(|(name, model, dimension)| (*name, model.clone(), *dimension))
            .ok_or_else(|| {
                EmbeddingError::Initialization(format!(
                    "Unsupported model: {}. Supported: {}",
                    model_name,
                    supported_models().collect::<Vec<_>>().join(", ")
                ))
            })?;

        tracing::info!(
            "Initializing embedding model: {} ({}D, downloaded on first use)",
            canonical,
            dimension
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);
        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::Initialization(e.to_string()))?;

        Ok(Self {
            model,
            model_name: canonical,
            dimension,
        })
    }

    /// Create a provider with the default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

impl EmbeddingProvider for FastEmbedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        let mut embeddings = self
            .model
            .embed(vec![text.to_string()], None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;

        let embedding = match embeddings.pop() {
            Some(embedding) if embeddings.is_empty() => embedding,
            _ => {
                return Err(EmbeddingError::Generation(
                    "Model did not return exactly one embedding".to_string(),
                ))
            }
        };

        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings = self
            .model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::Generation(e.to_string()))?;

        // One vector per text, no silent drops; the caller maps results
        // back to inputs by position.
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::Generation(format!(
                "Model returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }

        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_model_is_rejected() {
        let result = FastEmbedProvider::new("word2vec-google-news");
        match result {
            Err(EmbeddingError::Initialization(message)) => {
                assert!(message.contains("Unsupported model"));
                assert!(message.contains("all-MiniLM-L6-v2"));
            }
            _ => panic!("expected initialization error"),
        }
    }

    #[test]
    fn test_supported_models_listed() {
        let models: Vec<_> = supported_models().collect();
        assert!(models.contains(&"all-MiniLM-L6-v2"));
        assert!(models.contains(&"bge-base-en-v1.5"));
    }

    #[test]
    fn test_zero_vector() {
        let vector = zero_vector(384);
        assert_eq!(vector.len(), 384);
        assert!(vector.iter().all(|&v| v == 0.0));
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_provider_creation() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        assert_eq!(provider.dimension(), 384);
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_case_insensitive_lookup_keeps_canonical_name() {
        let provider = FastEmbedProvider::new("all-minilm-l6-v2").unwrap();
        assert_eq!(provider.model_name(), "all-MiniLM-L6-v2");
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider.embed("This is a test sentence for embedding.").unwrap();
        assert_eq!(embedding.len(), 384);

        // fastembed normalizes output, so magnitude should be close to 1
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.1);
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_batch_embedding_preserves_order() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let texts = vec![
            "Reactor maintenance schedule.".to_string(),
            "Quarterly earnings report.".to_string(),
        ];

        let batch = provider.embed_batch(&texts).unwrap();
        assert_eq!(batch.len(), 2);

        let first = provider.embed(&texts[0]).unwrap();
        let distance: f32 = batch[0]
            .iter()
            .zip(first.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        assert!(distance < 1e-6);
    }

    #[test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    fn test_empty_text_rejected() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        assert!(provider.embed("").is_err());
        assert!(provider.embed("   ").is_err());
    }
}
