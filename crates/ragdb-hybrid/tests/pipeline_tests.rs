use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::sleep;
use std::time::Duration;

use ragdb_core::config::RetrievalSettings;
use ragdb_core::error::Error;
use ragdb_core::traits::{Embedder, RelevanceScorer, Tokenizer};
use ragdb_core::types::{Chunk, ChunkId, FusedResult, SignalScores};
use ragdb_embed::{embed_chunks, HashingEmbedder};
use ragdb_hybrid::{
    CorpusHandle, CorpusSlot, HybridRetriever, LexicalOverlapScorer, NoFilter, RerankStatus, Reranker, RetrievalMode,
    SignalStatus,
};
use ragdb_text::StemmingTokenizer;
use ragdb_vector::FlatIndex;
use tracing_subscriber::fmt::MakeWriter;

const RAG: &str = "RAG stands for Retrieval-Augmented Generation.";
const VECTORS: &str = "Vector indexes enable fast similarity search.";

fn chunk(id: ChunkId, source: &str, text: &str) -> Chunk {
    Chunk { id, text: text.to_string(), source: source.to_string(), local_index: 0 }
}

fn rag_chunks() -> Vec<Chunk> {
    vec![chunk(0, "doc1", RAG), chunk(1, "doc2", VECTORS)]
}

/// Index vectors with the hashing embedder, then answer queries with `query_embedder`.
fn corpus_with(chunks: Vec<Chunk>, query_embedder: Arc<dyn Embedder>, tokenizer: Arc<dyn Tokenizer>) -> CorpusHandle {
    let embedder = HashingEmbedder::default();
    let vectors = embed_chunks(&embedder, &chunks, 8).expect("embed");
    let ids = chunks.iter().map(|c| c.id).collect();
    let index = FlatIndex::from_vectors(embedder.dim(), ids, vectors).expect("index");
    CorpusHandle::build(chunks, Arc::new(index), query_embedder, tokenizer).expect("corpus")
}

fn corpus(chunks: Vec<Chunk>) -> CorpusHandle {
    corpus_with(chunks, Arc::new(HashingEmbedder::default()), Arc::new(StemmingTokenizer::new()))
}

fn settings(top_k: usize) -> RetrievalSettings {
    RetrievalSettings { weight: 0.5, top_k, signal_timeout_ms: 200, rerank_timeout_ms: 200, ..Default::default() }
}

fn retriever(settings: RetrievalSettings) -> HybridRetriever {
    HybridRetriever::new(settings, Some(Reranker::new(Arc::new(LexicalOverlapScorer::default()))))
}

struct SlowEmbedder {
    inner: HashingEmbedder,
    delay: Duration,
}

impl Embedder for SlowEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        sleep(self.delay);
        self.inner.embed_batch(texts)
    }
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn dim(&self) -> usize { ragdb_embed::DEFAULT_DIM }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding service offline")
    }
}

/// Sleeps whenever the text mentions "zzz"; otherwise behaves like the stemming tokenizer.
struct SleepyTokenizer(StemmingTokenizer);

impl Tokenizer for SleepyTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        if text.contains("zzz") {
            sleep(Duration::from_millis(600));
        }
        self.0.tokenize(text)
    }
}

struct BrokenScorer;

impl RelevanceScorer for BrokenScorer {
    fn score_pairs(&self, _query: &str, _texts: &[&str]) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("cross-encoder not loaded")
    }
}

struct SlowScorer;

impl RelevanceScorer for SlowScorer {
    fn score_pairs(&self, _query: &str, texts: &[&str]) -> anyhow::Result<Vec<f32>> {
        sleep(Duration::from_millis(600));
        Ok(vec![1.0; texts.len()])
    }
}

struct LengthScorer;

impl RelevanceScorer for LengthScorer {
    fn score_pairs(&self, _query: &str, texts: &[&str]) -> anyhow::Result<Vec<f32>> {
        Ok(texts.iter().map(|t| t.len() as f32).collect())
    }
}

struct ConstantScorer;

impl RelevanceScorer for ConstantScorer {
    fn score_pairs(&self, _query: &str, texts: &[&str]) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.5; texts.len()])
    }
}

#[tokio::test]
async fn definition_query_returns_the_definition_chunk() {
    let corpus = corpus(rag_chunks());
    let retrieval = retriever(settings(1)).retrieve(&corpus, "what does RAG stand for?").await.expect("retrieve");
    assert_eq!(retrieval.results.len(), 1);
    let top = &retrieval.results[0];
    assert_eq!(top.chunk_id, 0);
    assert_eq!(top.source, "doc1");
    assert_eq!(top.rank, 1);
    assert_eq!(retrieval.rerank, RerankStatus::Applied);
    assert!(!retrieval.is_degraded());

    let both = retriever(settings(2)).retrieve(&corpus, "what does RAG stand for?").await.expect("retrieve");
    assert_eq!(both.results.len(), 2);
    let a = both.results.iter().find(|r| r.chunk_id == 0).and_then(|r| r.rerank_score).expect("A score");
    let b = both.results.iter().find(|r| r.chunk_id == 1).and_then(|r| r.rerank_score).expect("B score");
    assert!(a > b);
}

#[tokio::test]
async fn non_definition_query_drops_stands_for_passages() {
    let corpus = corpus(rag_chunks());
    let retrieval = retriever(settings(5))
        .retrieve(&corpus, "how does a vector index help retrieval?")
        .await
        .expect("retrieve");
    assert!(retrieval.results.iter().all(|r| !r.text.to_lowercase().contains("stands for")));
    assert_eq!(retrieval.results.iter().map(|r| r.chunk_id).collect::<Vec<_>>(), vec![1]);
}

#[tokio::test]
async fn filter_is_pluggable() {
    let corpus = corpus(rag_chunks());
    let retrieval = retriever(settings(5))
        .with_filter(Arc::new(NoFilter))
        .retrieve(&corpus, "how does a vector index help retrieval?")
        .await
        .expect("retrieve");
    assert_eq!(retrieval.results.len(), 2);
}

#[tokio::test]
async fn slow_vector_signal_degrades_to_lexical() {
    let slow = Arc::new(SlowEmbedder { inner: HashingEmbedder::default(), delay: Duration::from_millis(600) });
    let corpus = corpus_with(rag_chunks(), slow, Arc::new(StemmingTokenizer::new()));
    let retrieval = retriever(settings(3)).retrieve(&corpus, "what does RAG stand for?").await.expect("retrieve");
    assert_eq!(retrieval.vector, SignalStatus::TimedOut);
    assert_eq!(retrieval.lexical, SignalStatus::Ok(1));
    assert!(retrieval.is_degraded());
    assert_eq!(retrieval.results.len(), 1);
    assert_eq!(retrieval.results[0].chunk_id, 0);
    assert_eq!(retrieval.results[0].signals.vector, 0.0);
}

#[tokio::test]
async fn failing_vector_signal_degrades_to_lexical() {
    let corpus = corpus_with(rag_chunks(), Arc::new(BrokenEmbedder), Arc::new(StemmingTokenizer::new()));
    let retrieval = retriever(settings(3)).retrieve(&corpus, "what does RAG stand for?").await.expect("retrieve");
    assert!(matches!(retrieval.vector, SignalStatus::Failed(_)));
    assert_eq!(retrieval.results[0].chunk_id, 0);
}

#[tokio::test]
async fn no_signal_succeeding_is_an_error() {
    let corpus = corpus_with(rag_chunks(), Arc::new(BrokenEmbedder), Arc::new(SleepyTokenizer(StemmingTokenizer::new())));
    let err = retriever(settings(3)).retrieve(&corpus, "zzz rag").await.unwrap_err();
    assert!(matches!(err, Error::Operation(_)));
}

#[tokio::test]
async fn stop_word_query_still_uses_vector_signal() {
    let corpus = corpus(rag_chunks());
    let retrieval = retriever(settings(5)).retrieve(&corpus, "what is the").await.expect("retrieve");
    assert_eq!(retrieval.lexical, SignalStatus::Ok(0));
    assert_eq!(retrieval.vector, SignalStatus::Ok(2));
    assert!(!retrieval.results.is_empty());
}

#[tokio::test]
async fn empty_corpus_returns_no_results() {
    let corpus = CorpusHandle::empty(Arc::new(HashingEmbedder::default()), Arc::new(StemmingTokenizer::new())).expect("corpus");
    let retrieval = retriever(settings(5)).retrieve(&corpus, "anything at all").await.expect("retrieve");
    assert!(retrieval.results.is_empty());
}

#[tokio::test]
async fn reranker_failure_is_explicit() {
    let corpus = corpus(rag_chunks());
    let retriever = HybridRetriever::new(settings(2), Some(Reranker::new(Arc::new(BrokenScorer))));
    let err = retriever.retrieve(&corpus, "what does RAG stand for?").await.unwrap_err();
    assert!(matches!(err, Error::RerankerUnavailable(_)));
}

#[tokio::test]
async fn reranker_timeout_is_explicit() {
    let corpus = corpus(rag_chunks());
    let retriever = HybridRetriever::new(settings(2), Some(Reranker::new(Arc::new(SlowScorer))));
    let err = retriever.retrieve(&corpus, "what does RAG stand for?").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { stage: "rerank", .. }));
}

#[tokio::test]
async fn reranker_failure_falls_back_when_configured() {
    let corpus = corpus(rag_chunks());
    let settings = RetrievalSettings { fallback_to_fusion: true, ..settings(2) };
    let retriever = HybridRetriever::new(settings, Some(Reranker::new(Arc::new(BrokenScorer))));
    let retrieval = retriever.retrieve(&corpus, "what does RAG stand for?").await.expect("retrieve");
    assert!(matches!(retrieval.rerank, RerankStatus::FellBack(_)));
    assert!(retrieval.is_degraded());
    assert!(retrieval.results.iter().all(|r| r.rerank_score.is_none()));
    assert_eq!(retrieval.results[0].chunk_id, 0);
}

#[tokio::test]
async fn disabled_reranking_keeps_fusion_order() {
    let corpus = corpus(rag_chunks());
    let settings = RetrievalSettings { rerank: false, ..settings(2) };
    let retrieval = retriever(settings).retrieve(&corpus, "what does RAG stand for?").await.expect("retrieve");
    assert_eq!(retrieval.rerank, RerankStatus::Disabled);
    assert!(retrieval.results.windows(2).all(|w| w[0].hybrid_score >= w[1].hybrid_score));
    assert_eq!(retrieval.results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test]
async fn single_signal_modes_skip_the_other_signal() {
    let corpus = corpus(rag_chunks());
    let retriever = retriever(settings(5));

    let lexical = retriever.retrieve_with(&corpus, "what does RAG stand for?", RetrievalMode::Lexical, 5).await.expect("lexical");
    assert_eq!(lexical.vector, SignalStatus::Skipped);
    assert_eq!(lexical.rerank, RerankStatus::Skipped);
    assert_eq!(lexical.results.len(), 1);
    assert_eq!(lexical.results[0].hybrid_score, 1.0);
    assert!(lexical.results[0].rerank_score.is_none());

    let vector = retriever.retrieve_with(&corpus, "similarity search", RetrievalMode::Vector, 5).await.expect("vector");
    assert_eq!(vector.lexical, SignalStatus::Skipped);
    assert_eq!(vector.results.len(), 2);
    assert_eq!(vector.results[0].chunk_id, 1);
    assert_eq!(vector.results[0].hybrid_score, 1.0);
}

#[tokio::test]
async fn old_handle_survives_a_swap() {
    let slot = CorpusSlot::new(corpus(rag_chunks()));
    let before = slot.current();
    slot.rebuild(|| Ok(corpus(vec![chunk(0, "doc3", "Bread needs flour and water.")]))).expect("rebuild");

    let retriever = retriever(settings(1));
    let old = retriever.retrieve(&before, "what does RAG stand for?").await.expect("old");
    assert_eq!(old.results[0].text, RAG);
    let new = retriever.retrieve(&slot.current(), "bread flour").await.expect("new");
    assert_eq!(new.results[0].source, "doc3");
}

fn fused(corpus: &CorpusHandle) -> Vec<FusedResult> {
    corpus
        .chunks()
        .iter()
        .enumerate()
        .map(|(i, c)| FusedResult { chunk_id: c.id, hybrid_score: 1.0 - i as f32 * 0.05, signals: SignalScores::default(), rank: i + 1 })
        .collect()
}

fn ten_chunks() -> Vec<Chunk> {
    (0..10).map(|i| Chunk { id: i, text: "x".repeat(i as usize + 1), source: "doc".into(), local_index: i as usize }).collect()
}

#[test]
fn reranker_truncates_to_top_k_by_score() {
    let corpus = corpus(ten_chunks());
    let ranked = Reranker::new(Arc::new(LengthScorer)).rerank("q", fused(&corpus), &corpus, 2).expect("rerank");
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked.iter().map(|r| r.chunk_id).collect::<Vec<_>>(), vec![9, 8]);
    assert!(ranked[0].rerank_score >= ranked[1].rerank_score);
    assert_eq!(ranked.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn equal_rerank_scores_keep_fused_order() {
    let corpus = corpus(ten_chunks());
    let ranked = Reranker::new(Arc::new(ConstantScorer)).rerank("q", fused(&corpus), &corpus, 10).expect("rerank");
    assert_eq!(ranked.iter().map(|r| r.chunk_id).collect::<Vec<_>>(), (0..10).collect::<Vec<ChunkId>>());
}

/// In-memory sink for a test-local fmt subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(PoisonError::into_inner)).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn every_successful_exit_logs_completion() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt().with_writer(logs.clone()).with_ansi(false).finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let rag = corpus(rag_chunks());
    let lexical_only = retriever(settings(5))
        .retrieve_with(&rag, "what does RAG stand for?", RetrievalMode::Lexical, 5)
        .await
        .expect("lexical");
    assert_eq!(lexical_only.rerank, RerankStatus::Skipped);

    let unranked = retriever(RetrievalSettings { rerank: false, ..settings(2) })
        .retrieve(&rag, "what does RAG stand for?")
        .await
        .expect("disabled");
    assert_eq!(unranked.rerank, RerankStatus::Disabled);

    let only_definition = corpus(vec![chunk(0, "doc1", RAG)]);
    let filtered_out = retriever(settings(5))
        .retrieve(&only_definition, "how is retrieval augmented generation used?")
        .await
        .expect("filtered");
    assert!(filtered_out.results.is_empty());

    assert_eq!(logs.text().matches("retrieval complete").count(), 3, "{}", logs.text());
}
