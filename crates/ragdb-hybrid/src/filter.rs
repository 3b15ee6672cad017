//! Post-fusion semantic filtering.

use ragdb_core::types::FusedResult;
use tracing::{debug, warn};

use crate::corpus::CorpusHandle;

/// Decides, per query, which fused results must not reach the reranker.
pub trait SemanticFilter: Send + Sync {
    fn rejects(&self, query: &str, text: &str) -> bool;
}

/// Keeps every result.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl SemanticFilter for NoFilter {
    fn rejects(&self, _query: &str, _text: &str) -> bool {
        false
    }
}

/// Drops "X stands for Y" passages unless the query itself asks what
/// something stands for.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionLeakFilter;

/// True when the query contains "stand for" or "stands for", any case.
pub fn is_definition_request(query: &str) -> bool {
    let q = query.to_lowercase();
    q.contains("stand for") || q.contains("stands for")
}

impl SemanticFilter for DefinitionLeakFilter {
    fn rejects(&self, query: &str, text: &str) -> bool {
        !is_definition_request(query) && text.to_lowercase().contains("stands for")
    }
}

/// Apply `filter` to fused results, preserving order and ranks. Results whose
/// id is not in the corpus are dropped.
pub fn apply(filter: &dyn SemanticFilter, query: &str, results: Vec<FusedResult>, corpus: &CorpusHandle) -> Vec<FusedResult> {
    let before = results.len();
    let kept: Vec<FusedResult> = results
        .into_iter()
        .filter(|r| match corpus.text(r.chunk_id) {
            Some(text) => !filter.rejects(query, text),
            None => {
                warn!("Dropping fused result for unknown chunk {}", r.chunk_id);
                false
            }
        })
        .collect();
    debug!(before, after = kept.len(), "semantic filter");
    kept
}
