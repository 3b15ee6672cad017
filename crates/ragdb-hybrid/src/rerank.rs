//! Pairwise reranking of fused results.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{RelevanceScorer, Tokenizer};
use ragdb_core::types::{FusedResult, RankedResult};
use ragdb_text::StemmingTokenizer;
use tracing::{debug, warn};

use crate::corpus::CorpusHandle;

/// Reorders fused results with an external relevance model.
#[derive(Clone)]
pub struct Reranker {
    scorer: Arc<dyn RelevanceScorer>,
}

impl Reranker {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self { scorer }
    }

    /// Score every result against `query` in one batch, sort by descending
    /// relevance (equal scores keep fused order), keep `top_k` and assign
    /// 1-based ranks.
    ///
    /// Any scorer failure, a short or long score list, or a NaN score is
    /// reported as [`Error::RerankerUnavailable`]; no partial ordering is
    /// returned.
    pub fn rerank(&self, query: &str, results: Vec<FusedResult>, corpus: &CorpusHandle, top_k: usize) -> Result<Vec<RankedResult>> {
        let pairs: Vec<_> = results
            .into_iter()
            .filter_map(|r| match corpus.chunk(r.chunk_id) {
                Some(chunk) => Some((r, chunk)),
                None => {
                    warn!("Skipping rerank of unknown chunk {}", r.chunk_id);
                    None
                }
            })
            .collect();
        if pairs.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let texts: Vec<&str> = pairs.iter().map(|(_, chunk)| chunk.text.as_str()).collect();
        let scores = self
            .scorer
            .score_pairs(query, &texts)
            .map_err(|e| Error::RerankerUnavailable(e.to_string()))?;
        if scores.len() != pairs.len() {
            return Err(Error::RerankerUnavailable(format!(
                "model returned {} scores for {} passages",
                scores.len(),
                pairs.len()
            )));
        }
        if scores.iter().any(|s| s.is_nan()) {
            return Err(Error::RerankerUnavailable("model returned NaN score".to_string()));
        }

        let candidates = pairs.len();
        let mut scored: Vec<_> = pairs.into_iter().zip(scores).collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);
        debug!(candidates, kept = scored.len(), elapsed_ms = start.elapsed().as_millis() as u64, "rerank");

        Ok(scored
            .into_iter()
            .enumerate()
            .map(|(i, ((fused, chunk), score))| RankedResult::from_fused(&fused, chunk, i + 1, Some(score)))
            .collect())
    }
}

/// Relevance as the share of distinct stemmed query terms found in the
/// passage. Used as the offline stand-in for a cross-encoder.
pub struct LexicalOverlapScorer {
    tokenizer: Arc<dyn Tokenizer>,
}

impl Default for LexicalOverlapScorer {
    fn default() -> Self {
        Self { tokenizer: Arc::new(StemmingTokenizer::new()) }
    }
}

impl LexicalOverlapScorer {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }
}

impl RelevanceScorer for LexicalOverlapScorer {
    fn score_pairs(&self, query: &str, texts: &[&str]) -> anyhow::Result<Vec<f32>> {
        let terms: HashSet<String> = self.tokenizer.tokenize(query).into_iter().collect();
        if terms.is_empty() {
            return Ok(vec![0.0; texts.len()]);
        }
        Ok(texts
            .iter()
            .map(|text| {
                let words: HashSet<String> = self.tokenizer.tokenize(text).into_iter().collect();
                terms.iter().filter(|t| words.contains(*t)).count() as f32 / terms.len() as f32
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_scorer_prefers_shared_terms() {
        let scores = LexicalOverlapScorer::default()
            .score_pairs(
                "what does RAG stand for?",
                &["RAG stands for Retrieval-Augmented Generation.", "Vector indexes enable fast similarity search."],
            )
            .expect("scores");
        assert_eq!(scores, vec![1.0, 0.0]);
    }

    #[test]
    fn overlap_scorer_handles_stop_word_query() {
        let scores = LexicalOverlapScorer::default().score_pairs("what is the", &["anything"]).expect("scores");
        assert_eq!(scores, vec![0.0]);
    }
}
