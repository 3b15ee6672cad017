//! ragdb-hybrid
//!
//! Query-time pipeline: lexical and vector signals run in parallel, are
//! max-normalized, fused by weighted sum, filtered and reranked.

pub mod corpus;
pub mod filter;
pub mod fusion;
pub mod normalize;
pub mod pipeline;
pub mod rerank;

pub use corpus::{CorpusHandle, CorpusIndex, CorpusSlot};
pub use filter::{DefinitionLeakFilter, NoFilter, SemanticFilter};
pub use fusion::{fuse, fuse_top};
pub use normalize::normalize;
pub use pipeline::{HybridRetriever, RerankStatus, Retrieval, RetrievalMode, SignalStatus};
pub use rerank::{LexicalOverlapScorer, Reranker};
