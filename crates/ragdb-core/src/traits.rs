use crate::types::ChunkId;

/// Text embedding model. Every vector it returns has length `dim()`.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Externally built nearest-neighbour structure.
///
/// `search` returns `(chunk_id, distance)` pairs ordered nearest first.
/// Distances are non-negative and lower means more similar.
pub trait VectorSearch: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<(ChunkId, f32)>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pairwise relevance model (e.g. a cross-encoder). Returns one score per
/// text, in input order; higher means more relevant to `query`.
pub trait RelevanceScorer: Send + Sync {
    fn score_pairs(&self, query: &str, texts: &[&str]) -> anyhow::Result<Vec<f32>>;
}

/// Splits text into index terms. Documents and queries must go through the
/// same tokenizer for lexical scores to mean anything.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}
