//! ragdb-embed
//!
//! A deterministic hashing embedder and batch helpers for turning chunks into
//! the vector artifact persisted next to the chunk store.

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};
use twox_hash::XxHash64;

use ragdb_core::traits::Embedder;
use ragdb_core::types::Chunk;

pub const DEFAULT_DIM: usize = 384;

/// Feature-hashing bag-of-words embedder.
///
/// Each lower-cased alphanumeric token lands in one bucket chosen by its
/// xxhash; the vector is L2-normalized. Texts sharing vocabulary end up close
/// in L2 distance, which is enough for offline corpora and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            // Weight in [0.5, 1.0] from the high bits so colliding tokens stay distinguishable.
            let val = 0.5 + ((h >> 32) as u32) as f32 / (u32::MAX as f32) * 0.5;
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Process-wide embedder, created on first use.
pub fn get_default_embedder() -> Arc<dyn Embedder> {
    static DEFAULT: OnceLock<Arc<dyn Embedder>> = OnceLock::new();
    DEFAULT
        .get_or_init(|| {
            info!("Using HashingEmbedder (dim {})", DEFAULT_DIM);
            Arc::new(HashingEmbedder::default())
        })
        .clone()
}

/// Embed chunk texts in batches, preserving chunk order. Fails if the
/// embedder returns the wrong number of vectors or a vector of the wrong size.
pub fn embed_chunks(embedder: &dyn Embedder, chunks: &[Chunk], batch_size: usize) -> Result<Vec<Vec<f32>>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }
    let batch_size = batch_size.max(1);
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );

    let mut vectors = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed_batch(&texts)?;
        if embedded.len() != texts.len() {
            return Err(anyhow!("embedder returned {} vectors for {} texts", embedded.len(), texts.len()));
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != embedder.dim()) {
            return Err(anyhow!("embedder returned a vector of dim {} (expected {})", bad.len(), embedder.dim()));
        }
        vectors.extend(embedded);
        pb.inc(batch.len() as u64);
        debug!("Embedded {}/{} chunks", vectors.len(), chunks.len());
    }
    pb.finish_with_message("embedding complete");
    Ok(vectors)
}
