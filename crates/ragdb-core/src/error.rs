use thiserror::Error;

use crate::types::ChunkId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Vector index holds {vectors} entries but metadata holds {metadata}")]
    CountMismatch { vectors: usize, metadata: usize },

    #[error("Duplicate chunk id {0}")]
    DuplicateChunkId(ChunkId),

    #[error("Chunk id {found} follows {previous}; ids must increase in corpus order")]
    NonMonotonicChunkId { previous: ChunkId, found: ChunkId },

    #[error("Duplicate local index {local_index} within source '{origin}'")]
    DuplicateLocalIndex { origin: String, local_index: usize },

    #[error("Vector artifact was built from a different corpus (fingerprint mismatch)")]
    FingerprintMismatch,

    #[error("Embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Reranker unavailable: {0}")]
    RerankerUnavailable(String),

    #[error("{stage} timed out after {millis}ms")]
    Timeout { stage: &'static str, millis: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
