// Vector index module
// In-memory (text, vector) entries for one session with cosine top-k search


use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embeddings::{Embedder, EmbeddingError};

/// Bounds on the embedding fan-out during ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Maximum embedding requests in flight at once
    pub concurrency: usize,
    /// Chunks sent per embedding request
    pub batch_size: usize,
}

impl Default for IngestOptions {
    #[inline]
    fn default() -> Self {
        Self {
            concurrency: 4,
            batch_size: 16,
        }
    }
}

/// One stored chunk; `text` and `vector` always belong to the same chunk
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Ordinal of the chunk in the document it came from
    pub position: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub position: usize,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed every non-blank chunk and collect the entries in chunk order.
    ///
    /// Nothing is returned unless every embedding call succeeds.
    #[inline]
    pub async fn build(
        chunks: &[String],
        embedder: &dyn Embedder,
        options: IngestOptions,
    ) -> Result<Self, EmbeddingError> {
        let (positions, texts): (Vec<usize>, Vec<String>) = chunks
            .iter()
            .enumerate()
            .filter(|(_, chunk)| !chunk.trim().is_empty())
            .map(|(position, chunk)| (position, chunk.clone()))
            .unzip();

        if texts.is_empty() {
            return Ok(Self::default());
        }

        let batch_size = options.batch_size.max(1);
        let concurrency = options.concurrency.max(1);
        debug!(
            "Embedding {} chunks in batches of {} ({} in flight)",
            texts.len(),
            batch_size,
            concurrency
        );

        let owned_batches: Vec<Vec<String>> =
            texts.chunks(batch_size).map(<[String]>::to_vec).collect();
        let batches: Vec<Vec<Vec<f32>>> = stream::iter(owned_batches)
            .map(|batch: Vec<String>| async move {
                let vectors = embedder.embed_batch(&batch).await?;
                if vectors.len() != batch.len() {
                    return Err(EmbeddingError::CountMismatch {
                        expected: batch.len(),
                        actual: vectors.len(),
                    });
                }
                Ok::<_, EmbeddingError>(vectors)
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = batches.into_iter().flatten().collect();
        let dimension = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let entries: Vec<IndexEntry> = positions
            .into_iter()
            .zip(texts)
            .zip(vectors)
            .map(|((position, text), vector)| IndexEntry {
                position,
                text,
                vector,
            })
            .collect();

        info!(
            "Built vector index with {} entries ({} dimensions)",
            entries.len(),
            dimension
        );
        Ok(Self { entries })
    }

    /// Replace all entries with a fresh build; on failure the current entries stay
    #[inline]
    pub async fn rebuild(
        &mut self,
        chunks: &[String],
        embedder: &dyn Embedder,
        options: IngestOptions,
    ) -> Result<(), EmbeddingError> {
        *self = Self::build(chunks, embedder, options).await?;
        Ok(())
    }

    /// Top `k` entries most similar to `query`.
    ///
    /// A blank query, `k == 0` or an empty index yields no hits and no embedding call.
    #[inline]
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<ScoredChunk>, EmbeddingError> {
        if k == 0 || self.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = embedder.embed(query).await?;
        self.rank(&query_vector, k)
    }

    /// Rank stored entries against an already embedded query
    #[inline]
    pub fn rank(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, EmbeddingError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let dimension = self.dimension();
        if query_vector.len() != dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: query_vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(slot, entry)| (slot, cosine_similarity(query_vector, &entry.vector)))
            .collect();

        // Stable sort: equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .filter_map(|(slot, score)| {
                self.entries.get(slot).map(|entry| ScoredChunk {
                    position: entry.position,
                    text: entry.text.clone(),
                    score,
                })
            })
            .collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, or 0 for an empty index
    #[inline]
    pub fn dimension(&self) -> usize {
        self.entries.first().map_or(0, |entry| entry.vector.len())
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    #[inline]
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.text.as_str())
    }
}

/// `dot(a, b) / (|a| * |b|)`, or 0.0 when either vector has zero length
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    // f64 sums so large components cannot overflow the squared norms
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .map(|(x, y)| (f64::from(*x), f64::from(*y)))
        .fold((0.0_f64, 0.0_f64, 0.0_f64), |(dot, na, nb), (x, y)| {
            (x.mul_add(y, dot), x.mul_add(x, na), y.mul_add(y, nb))
        });

    let denominator = norm_a.sqrt() * norm_b.sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (dot / denominator) as f32
}
