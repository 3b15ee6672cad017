//! ragdb-vector
//!
//! Exact nearest-neighbour search over the persisted embedding artifact, and
//! the adapter that turns index distances into similarity candidates.

pub mod flat;

pub use flat::FlatIndex;

use std::sync::Arc;

use anyhow::Result;
use ragdb_core::error::Error;
use ragdb_core::traits::{Embedder, VectorSearch};
use ragdb_core::types::Candidate;
use tracing::debug;

/// Map a non-negative distance onto (0, 1]; 0 distance is similarity 1.
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Embeds queries and searches an index, reporting similarities.
#[derive(Clone)]
pub struct VectorAdapter {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorSearch>,
}

impl VectorAdapter {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorSearch>) -> ragdb_core::error::Result<Self> {
        if !index.is_empty() && embedder.dim() != index.dim() {
            return Err(Error::DimensionMismatch { expected: index.dim(), found: embedder.dim() });
        }
        Ok(Self { embedder, index })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Top-`k` candidates by similarity, most similar first.
    pub fn score(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        if k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }
        let embedding = self.embedder.embed(query)?;
        if embedding.len() != self.index.dim() {
            return Err(Error::DimensionMismatch { expected: self.index.dim(), found: embedding.len() }.into());
        }
        let hits = self.index.search(&embedding, k)?;
        debug!(hits = hits.len(), "vector search");
        Ok(hits
            .into_iter()
            .map(|(chunk_id, distance)| Candidate { chunk_id, raw_score: distance_to_similarity(distance) })
            .collect())
    }
}
