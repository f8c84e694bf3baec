// Embeddings module
// Defines the text -> vector capability used by ingestion and search

use async_trait::async_trait;
use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("Refusing to embed empty text")]
    EmptyInput,
    #[error("Embedding provider call failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("Embedding provider returned no vector")]
    MissingVector,
    #[error("Expected {expected} embeddings, provider returned {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Converts text into fixed-length vectors.
///
/// Implementations must return vectors of one constant dimensionality and must
/// not be called with blank text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, returning vectors in input order.
    ///
    /// The default issues one `embed` call per text.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Replace newlines with spaces; embedding models treat newline tokens as noise
#[inline]
pub fn normalize_input(text: &str) -> Result<String, EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(text.replace(['\r', '\n'], " "))
}
