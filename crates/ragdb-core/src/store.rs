//! On-disk corpus layout.
//!
//! A store directory holds two JSON records:
//! - `store.json`: ordered chunk texts plus a parallel metadata list
//! - `vectors.json`: the embedding artifact the vector index is built from
//!
//! Both carry a blake3 fingerprint of the chunk texts. Loading rejects count
//! mismatches, fingerprint mismatches, duplicate or out-of-order ids and
//! ragged dimensions instead of truncating or padding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkId, ChunkMeta};

pub const STORE_FILE: &str = "store.json";
pub const VECTORS_FILE: &str = "vectors.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStore {
    pub texts: Vec<String>,
    pub metas: Vec<ChunkMeta>,
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorArtifact {
    pub dim: usize,
    pub fingerprint: String,
    pub vectors: Vec<Vec<f32>>,
}

/// A validated corpus read back from disk.
#[derive(Debug, Clone)]
pub struct PersistedCorpus {
    pub chunks: Vec<Chunk>,
    pub vectors: VectorArtifact,
    pub built_at: DateTime<Utc>,
}

/// Stable digest of the ordered chunk texts.
pub fn fingerprint<S: AsRef<str>>(texts: &[S]) -> String {
    let mut hasher = blake3::Hasher::new();
    for text in texts {
        hasher.update(text.as_ref().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Enforce unique, strictly increasing ids and per-source `local_index`
/// uniqueness.
pub fn validate_chunks(chunks: &[Chunk]) -> Result<()> {
    let mut ids = HashSet::with_capacity(chunks.len());
    let mut positions = HashSet::with_capacity(chunks.len());
    let mut previous: Option<ChunkId> = None;
    for chunk in chunks {
        if !ids.insert(chunk.id) {
            return Err(Error::DuplicateChunkId(chunk.id));
        }
        if let Some(previous) = previous.filter(|&p| p > chunk.id) {
            return Err(Error::NonMonotonicChunkId { previous, found: chunk.id });
        }
        previous = Some(chunk.id);
        if !positions.insert((chunk.source.as_str(), chunk.local_index)) {
            return Err(Error::DuplicateLocalIndex { origin: chunk.source.clone(), local_index: chunk.local_index });
        }
    }
    Ok(())
}

impl ChunkStore {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let fingerprint = fingerprint(&texts);
        Self { texts, metas: chunks.iter().map(Chunk::meta).collect(), fingerprint, built_at: Utc::now() }
    }

    pub fn into_chunks(self) -> Result<Vec<Chunk>> {
        if self.texts.len() != self.metas.len() {
            return Err(Error::Operation(format!(
                "store holds {} texts but {} metadata records",
                self.texts.len(),
                self.metas.len()
            )));
        }
        let chunks: Vec<Chunk> = self
            .texts
            .into_iter()
            .zip(self.metas)
            .map(|(text, meta)| Chunk { id: meta.id, text, source: meta.source, local_index: meta.local_index })
            .collect();
        validate_chunks(&chunks)?;
        Ok(chunks)
    }
}

impl VectorArtifact {
    pub fn new(dim: usize, fingerprint: String, vectors: Vec<Vec<f32>>) -> Result<Self> {
        let artifact = Self { dim, fingerprint, vectors };
        artifact.check_dims()?;
        Ok(artifact)
    }

    fn check_dims(&self) -> Result<()> {
        match self.vectors.iter().find(|v| v.len() != self.dim) {
            Some(v) => Err(Error::DimensionMismatch { expected: self.dim, found: v.len() }),
            None => Ok(()),
        }
    }
}

/// Persist chunks and their embeddings into `dir`, replacing any previous
/// store. Each file is written to a temporary name and renamed into place.
pub fn save(dir: &Path, chunks: &[Chunk], dim: usize, vectors: Vec<Vec<f32>>) -> Result<()> {
    if vectors.len() != chunks.len() {
        return Err(Error::CountMismatch { vectors: vectors.len(), metadata: chunks.len() });
    }
    validate_chunks(chunks)?;
    let store = ChunkStore::from_chunks(chunks);
    let artifact = VectorArtifact::new(dim, store.fingerprint.clone(), vectors)?;

    fs::create_dir_all(dir)?;
    write_json(&dir.join(VECTORS_FILE), &artifact)?;
    write_json(&dir.join(STORE_FILE), &store)?;
    info!("Saved {} chunks (dim {}) to {}", chunks.len(), dim, dir.display());
    Ok(())
}

/// Read and validate a store directory written by [`save`].
pub fn load(dir: &Path) -> Result<PersistedCorpus> {
    let store_path = dir.join(STORE_FILE);
    let vectors_path = dir.join(VECTORS_FILE);
    if !store_path.exists() {
        return Err(Error::NotFound(store_path.display().to_string()));
    }
    if !vectors_path.exists() {
        return Err(Error::NotFound(vectors_path.display().to_string()));
    }
    let store: ChunkStore = serde_json::from_slice(&fs::read(&store_path)?)?;
    let vectors: VectorArtifact = serde_json::from_slice(&fs::read(&vectors_path)?)?;

    if vectors.vectors.len() != store.metas.len() {
        return Err(Error::CountMismatch { vectors: vectors.vectors.len(), metadata: store.metas.len() });
    }
    if vectors.fingerprint != store.fingerprint || fingerprint(&store.texts) != store.fingerprint {
        return Err(Error::FingerprintMismatch);
    }
    vectors.check_dims()?;
    let built_at = store.built_at;
    let chunks = store.into_chunks()?;
    info!("Loaded {} chunks from {}", chunks.len(), dir.display());
    Ok(PersistedCorpus { chunks, vectors, built_at })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
