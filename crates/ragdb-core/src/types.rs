//! Domain types used by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};

pub type ChunkId = u64;

/// An immutable unit of retrievable text.
///
/// - `id`: globally unique, assigned once at corpus build time and never reused
/// - `text`: whitespace-normalized payload
/// - `source`: origin document identifier (usually the file path)
/// - `local_index`: position of the chunk within its source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source: String,
    pub local_index: usize,
}

impl Chunk {
    pub fn meta(&self) -> ChunkMeta {
        ChunkMeta { id: self.id, source: self.source.clone(), local_index: self.local_index }
    }
}

/// Per-chunk metadata record persisted next to the chunk texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMeta {
    pub id: ChunkId,
    pub source: String,
    pub local_index: usize,
}

/// Indicates which retrieval signal produced a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Vector,
    Lexical,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vector => f.write_str("vector"),
            Self::Lexical => f.write_str("lexical"),
        }
    }
}

/// Raw output of one signal. Higher is better, but scales differ per signal,
/// so two candidates are only comparable after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk_id: ChunkId,
    pub raw_score: f32,
}

/// A candidate rescaled onto [0, 1] relative to one query and one signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCandidate {
    pub chunk_id: ChunkId,
    pub score: f32,
}

/// Normalized per-signal scores; a signal that did not return the chunk
/// contributes 0.0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalScores {
    pub vector: f32,
    pub lexical: f32,
}

/// One entry of the fused ranking. `rank` is the 1-based fusion position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub chunk_id: ChunkId,
    pub hybrid_score: f32,
    pub signals: SignalScores,
    pub rank: usize,
}

/// The contract handed to answer-synthesis consumers.
///
/// `rerank_score` is `None` only when the caller opted into fusion-only
/// ranking (reranking disabled, or the declared fallback kicked in).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub chunk_id: ChunkId,
    pub source: String,
    pub local_index: usize,
    pub text: String,
    pub rank: usize,
    pub hybrid_score: f32,
    pub rerank_score: Option<f32>,
    pub signals: SignalScores,
}

impl RankedResult {
    pub fn from_fused(fused: &FusedResult, chunk: &Chunk, rank: usize, rerank_score: Option<f32>) -> Self {
        Self {
            chunk_id: fused.chunk_id,
            source: chunk.source.clone(),
            local_index: chunk.local_index,
            text: chunk.text.clone(),
            rank,
            hybrid_score: fused.hybrid_score,
            rerank_score,
            signals: fused.signals,
        }
    }
}
