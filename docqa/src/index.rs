use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::EMBEDDING_BATCH_SIZE,
    provider::{Embedder, ServiceError},
    splitter::Chunk,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Distance {
    #[default]
    Euclidean,
    Cosine,
}

impl FromStr for Distance {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            _ => Err(()),
        }
    }
}

impl Distance {
    /// Larger is more similar.
    fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Euclidean => {
                let distance = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y).powi(2))
                    .sum::<f32>()
                    .sqrt();

                -distance
            }
            Self::Cosine => {
                let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
                let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt();
                let denominator = norm(a) * norm(b);

                if denominator == 0.0 {
                    0.0
                } else {
                    dot / denominator
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("No chunks provided to create vector store.")]
    NoChunks,

    #[error("Failed to embed documents with {model}: {source}")]
    Embedding {
        model: String,
        #[source]
        source: ServiceError,
    },

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl BuildError {
    /// What the user can do about it, if anything.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        let Self::Embedding { model, source } = self else {
            return None;
        };

        match source {
            ServiceError::Unauthenticated(_) => Some(
                "Please check that your API key is correct and has access to the embedding model."
                    .to_string(),
            ),
            ServiceError::PermissionDenied(_) => Some(
                "Permission denied. Ensure the API key is enabled for the embedding API in your project."
                    .to_string(),
            ),
            ServiceError::RateLimited(_) => Some(
                "You might have hit API rate limits. Please wait and try again later or check your quota."
                    .to_string(),
            ),
            ServiceError::ModelNotFound(_) => Some(format!(
                "Embedding model '{model}' not found or unavailable with your API key."
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Query dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone)]
pub struct PointStruct {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: Chunk,
}

#[derive(Debug, Clone)]
pub struct PointResult {
    pub id: Uuid,
    pub score: f32,
    pub payload: Chunk,
}

/// Exact nearest-neighbour index held in memory.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    distance: Distance,
    dimension: usize,
    points: Vec<PointStruct>,
}

impl VectorIndex {
    /// Creates an empty index for vectors of `dimension` components.
    #[must_use]
    pub const fn new(distance: Distance, dimension: usize) -> Self {
        Self {
            distance,
            dimension,
            points: Vec::new(),
        }
    }

    /// Embeds every chunk and indexes the results. Nothing is kept on failure.
    ///
    /// # Errors
    ///
    /// - If there are no chunks.
    /// - If the embedding service fails.
    /// - If the service returns the wrong number of vectors, or vectors of different sizes.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        distance: Distance,
    ) -> Result<Self, BuildError> {
        if chunks.is_empty() {
            return Err(BuildError::NoChunks);
        }

        info!(
            "Embedding {} chunks with {}",
            chunks.len(),
            embedder.model()
        );

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBEDDING_BATCH_SIZE) {
            let texts = batch.iter().map(|c| c.text.clone()).collect::<Vec<_>>();

            let embeddings = embedder
                .embed_documents(&texts)
                .await
                .map_err(|source| BuildError::Embedding {
                    model: embedder.model().to_string(),
                    source,
                })?;

            if embeddings.len() != batch.len() {
                return Err(BuildError::CountMismatch {
                    expected: batch.len(),
                    actual: embeddings.len(),
                });
            }

            vectors.extend(embeddings);
            debug!("Embedded {}/{} chunks", vectors.len(), chunks.len());
        }

        let mut index = Self::new(distance, vectors[0].len());
        index.upsert(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(payload, vector)| PointStruct {
                    id: Uuid::new_v4(),
                    vector,
                    payload,
                })
                .collect(),
        )?;

        info!("Vector store created with {} points", index.len());

        Ok(index)
    }

    /// Adds points to the index.
    ///
    /// # Errors
    ///
    /// Fails without inserting anything if any vector has the wrong dimension.
    pub fn upsert(&mut self, points: Vec<PointStruct>) -> Result<(), BuildError> {
        if let Some(point) = points.iter().find(|p| p.vector.len() != self.dimension) {
            return Err(BuildError::DimensionMismatch {
                expected: self.dimension,
                actual: point.vector.len(),
            });
        }

        self.points.extend(points);

        Ok(())
    }

    /// Returns the `count` points closest to `vector`, most similar first.
    ///
    /// # Errors
    ///
    /// Returns an error if `vector` doesn't match the index dimension.
    pub fn query(&self, vector: &[f32], count: usize) -> Result<Vec<PointResult>, SearchError> {
        if count == 0 || self.points.is_empty() {
            return Ok(vec![]);
        }

        if vector.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut scored = self
            .points
            .iter()
            .map(|point| {
                let score = self.distance.score(&point.vector, vector);

                // degenerate vectors rank last
                (if score.is_nan() { f32::NEG_INFINITY } else { score }, point)
            })
            .collect::<Vec<_>>();

        // stable, so ties keep insertion order
        scored.sort_by(|(a, _), (b, _)| b.total_cmp(a));

        Ok(scored
            .into_iter()
            .take(count)
            .map(|(score, point)| PointResult {
                id: point.id,
                score,
                payload: point.payload.clone(),
            })
            .collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }
}
