//! End-to-end hybrid retrieval.
//!
//! ```text
//! query ──┬─ lexical (BM25) ──┐
//!         └─ embed + search ──┴─ normalize ─ fuse ─ filter ─ rerank ─ top_k
//! ```
//!
//! Each signal runs on the blocking pool under its own timeout. A signal that
//! fails or times out is reported and the other signal carries the query;
//! only when no signal produced an answer does retrieval fail.

use std::sync::Arc;
use std::time::Duration;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::types::{Candidate, FusedResult, RankedResult, SignalKind};
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::corpus::CorpusHandle;
use crate::filter::{self, DefinitionLeakFilter, SemanticFilter};
use crate::fusion::fuse;
use crate::normalize::normalize;
use crate::rerank::Reranker;

/// Outcome of one retrieval signal for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// Ran to completion with this many candidates.
    Ok(usize),
    /// Not requested by the retrieval mode.
    Skipped,
    TimedOut,
    Failed(String),
}

impl SignalStatus {
    fn is_failure(&self) -> bool {
        matches!(self, Self::TimedOut | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStatus {
    Applied,
    /// Nothing to rerank, or the mode does not rerank.
    Skipped,
    /// Reranking turned off; results are in fusion order.
    Disabled,
    /// The reranker failed and the configured fallback returned fusion order.
    FellBack(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Hybrid,
    Lexical,
    Vector,
}

impl std::str::FromStr for RetrievalMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "lexical" | "bm25" => Ok(Self::Lexical),
            "vector" | "dense" => Ok(Self::Vector),
            other => Err(Error::InvalidConfig(format!("unknown retrieval mode '{other}'"))),
        }
    }
}

/// Ranked results plus what happened along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retrieval {
    pub results: Vec<RankedResult>,
    pub lexical: SignalStatus,
    pub vector: SignalStatus,
    pub rerank: RerankStatus,
}

impl Retrieval {
    fn empty() -> Self {
        Self { results: Vec::new(), lexical: SignalStatus::Skipped, vector: SignalStatus::Skipped, rerank: RerankStatus::Skipped }
    }

    /// True when a signal failed or reranking fell back to fusion order.
    pub fn is_degraded(&self) -> bool {
        self.lexical.is_failure() || self.vector.is_failure() || matches!(self.rerank, RerankStatus::FellBack(_))
    }
}

pub struct HybridRetriever {
    settings: RetrievalSettings,
    filter: Arc<dyn SemanticFilter>,
    reranker: Option<Reranker>,
}

impl HybridRetriever {
    pub fn new(settings: RetrievalSettings, reranker: Option<Reranker>) -> Self {
        Self { settings, filter: Arc::new(DefinitionLeakFilter), reranker }
    }

    pub fn with_filter(mut self, filter: Arc<dyn SemanticFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Hybrid retrieval with the configured `top_k`.
    pub async fn retrieve(&self, corpus: &CorpusHandle, query: &str) -> Result<Retrieval> {
        self.retrieve_with(corpus, query, RetrievalMode::Hybrid, self.settings.top_k).await
    }

    pub async fn retrieve_with(&self, corpus: &CorpusHandle, query: &str, mode: RetrievalMode, top_k: usize) -> Result<Retrieval> {
        if corpus.is_empty() || top_k == 0 {
            debug!("Empty corpus or top_k 0; nothing to retrieve");
            return Ok(Retrieval::empty());
        }

        let (lexical, vector) = match mode {
            RetrievalMode::Hybrid => tokio::join!(self.lexical_signal(corpus, query), self.vector_signal(corpus, query)),
            RetrievalMode::Lexical => (self.lexical_signal(corpus, query).await, (Vec::new(), SignalStatus::Skipped)),
            RetrievalMode::Vector => ((Vec::new(), SignalStatus::Skipped), self.vector_signal(corpus, query).await),
        };
        let (lexical, lexical_status) = lexical;
        let (vector, vector_status) = vector;
        info!(mode = ?mode, lexical = ?lexical_status, vector = ?vector_status, "signals complete");

        let ran_ok = [&lexical_status, &vector_status].iter().any(|s| matches!(s, SignalStatus::Ok(_)));
        if !ran_ok {
            return Err(Error::Operation(format!(
                "no retrieval signal succeeded (lexical: {lexical_status:?}, vector: {vector_status:?})"
            )));
        }

        let weight = match mode {
            RetrievalMode::Hybrid => self.settings.weight,
            RetrievalMode::Lexical => 0.0,
            RetrievalMode::Vector => 1.0,
        };
        let fused = fuse(&normalize(&vector), &normalize(&lexical), weight);
        debug!(fused = fused.len(), weight, "fusion");

        let (results, rerank) = self.order(corpus, query, mode, fused, top_k).await?;
        let retrieval = Retrieval { results, lexical: lexical_status, vector: vector_status, rerank };
        info!(results = retrieval.results.len(), rerank = ?retrieval.rerank, degraded = retrieval.is_degraded(), "retrieval complete");
        Ok(retrieval)
    }

    /// Filter and rerank fused results into the final top-`k`. Single-signal
    /// modes keep fusion order untouched.
    async fn order(
        &self,
        corpus: &CorpusHandle,
        query: &str,
        mode: RetrievalMode,
        fused: Vec<FusedResult>,
        top_k: usize,
    ) -> Result<(Vec<RankedResult>, RerankStatus)> {
        if mode != RetrievalMode::Hybrid {
            return Ok((fusion_order(fused, corpus, top_k), RerankStatus::Skipped));
        }

        let filtered = filter::apply(self.filter.as_ref(), query, fused, corpus);
        if filtered.is_empty() {
            return Ok((Vec::new(), RerankStatus::Skipped));
        }

        let reranker = match &self.reranker {
            Some(reranker) if self.settings.rerank => reranker.clone(),
            _ => return Ok((fusion_order(filtered, corpus, top_k), RerankStatus::Disabled)),
        };

        match self.run_rerank(reranker, corpus, query, filtered.clone(), top_k).await {
            Ok(results) => Ok((results, RerankStatus::Applied)),
            Err(e) if self.settings.fallback_to_fusion => {
                warn!("Reranker failed, falling back to fusion order: {}", e);
                Ok((fusion_order(filtered, corpus, top_k), RerankStatus::FellBack(e.to_string())))
            }
            Err(e) => Err(e),
        }
    }

    async fn lexical_signal(&self, corpus: &CorpusHandle, query: &str) -> (Vec<Candidate>, SignalStatus) {
        let corpus = corpus.clone();
        let query = query.to_string();
        let k = self.settings.lexical_k;
        run_signal(SignalKind::Lexical, self.settings.signal_timeout_ms, move || corpus.lexical().score(&query, k)).await
    }

    async fn vector_signal(&self, corpus: &CorpusHandle, query: &str) -> (Vec<Candidate>, SignalStatus) {
        let corpus = corpus.clone();
        let query = query.to_string();
        let k = self.settings.vector_k;
        run_signal(SignalKind::Vector, self.settings.signal_timeout_ms, move || corpus.vector().score(&query, k)).await
    }

    async fn run_rerank(
        &self,
        reranker: Reranker,
        corpus: &CorpusHandle,
        query: &str,
        fused: Vec<FusedResult>,
        top_k: usize,
    ) -> Result<Vec<RankedResult>> {
        let millis = self.settings.rerank_timeout_ms;
        let corpus = corpus.clone();
        let query = query.to_string();
        let task = spawn_blocking(move || reranker.rerank(&query, fused, &corpus, top_k));
        match timeout(Duration::from_millis(millis), task).await {
            Err(_) => Err(Error::Timeout { stage: "rerank", millis }),
            Ok(Err(join)) => Err(Error::RerankerUnavailable(join.to_string())),
            Ok(Ok(result)) => result,
        }
    }
}

/// Run one signal on the blocking pool. Failures and timeouts become a
/// status with no candidates; the blocking work itself is not cancelled.
async fn run_signal<F>(kind: SignalKind, millis: u64, work: F) -> (Vec<Candidate>, SignalStatus)
where
    F: FnOnce() -> anyhow::Result<Vec<Candidate>> + Send + 'static,
{
    match timeout(Duration::from_millis(millis), spawn_blocking(work)).await {
        Err(_) => {
            warn!("{} signal timed out after {}ms", kind, millis);
            (Vec::new(), SignalStatus::TimedOut)
        }
        Ok(Err(join)) => {
            warn!("{} signal task failed: {}", kind, join);
            (Vec::new(), SignalStatus::Failed(join.to_string()))
        }
        Ok(Ok(Err(e))) => {
            warn!("{} signal failed: {:#}", kind, e);
            (Vec::new(), SignalStatus::Failed(e.to_string()))
        }
        Ok(Ok(Ok(candidates))) => {
            debug!("{} signal returned {} candidates", kind, candidates.len());
            let n = candidates.len();
            (candidates, SignalStatus::Ok(n))
        }
    }
}

/// Fused results as final results without reranking.
fn fusion_order(fused: Vec<FusedResult>, corpus: &CorpusHandle, top_k: usize) -> Vec<RankedResult> {
    fused
        .iter()
        .filter_map(|f| corpus.chunk(f.chunk_id).map(|chunk| (f, chunk)))
        .take(top_k)
        .enumerate()
        .map(|(i, (f, chunk))| RankedResult::from_fused(f, chunk, i + 1, None))
        .collect()
}
