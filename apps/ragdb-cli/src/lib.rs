//! Shared plumbing for the `ragdb` binaries: logging setup, ingest, corpus
//! loading and output formatting.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ragdb_core::config::{LogFormat, LoggingSettings, RetrievalSettings};
use ragdb_core::data_processor::{ChunkingConfig, DataProcessor};
use ragdb_core::store;
use ragdb_core::traits::{Embedder, Tokenizer};
use ragdb_core::types::RankedResult;
use ragdb_embed::embed_chunks;
use ragdb_hybrid::filter::is_definition_request;
use ragdb_hybrid::{CorpusHandle, HybridRetriever, LexicalOverlapScorer, Reranker, Retrieval};
use ragdb_text::StemmingTokenizer;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const EMBED_BATCH_SIZE: usize = 64;
pub const UNKNOWN_ANSWER: &str = "I don't know based on the provided context.";

/// Install the stderr fmt subscriber. `RAGDB_LOG` wins over the configured level.
/// Fails if a global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_env("RAGDB_LOG").unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = match settings.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

/// Chunk, embed and persist every `.txt` file under `data_dir`. Returns the
/// number of chunks written.
pub fn ingest(
    data_dir: &Path,
    store_dir: &Path,
    chunking: ChunkingConfig,
    limit: Option<usize>,
    embedder: &dyn Embedder,
) -> Result<usize> {
    let processor = DataProcessor::with_config(chunking)?;
    let documents = processor.load_documents(data_dir, limit)?;
    let chunks = processor.chunk_documents(&documents);
    let vectors = embed_chunks(embedder, &chunks, EMBED_BATCH_SIZE)?;
    store::save(store_dir, &chunks, embedder.dim(), vectors)
        .with_context(|| format!("failed to write store to {}", store_dir.display()))?;
    info!("Ingested {} documents into {} chunks", documents.len(), chunks.len());
    Ok(chunks.len())
}

pub fn default_tokenizer() -> Arc<dyn Tokenizer> {
    Arc::new(StemmingTokenizer::new())
}

/// Load a persisted store and build a queryable snapshot over it.
pub fn open_corpus(store_dir: &Path, embedder: Arc<dyn Embedder>) -> Result<CorpusHandle> {
    let persisted = store::load(store_dir)
        .with_context(|| format!("failed to load store from {} (run `ragdb ingest` first)", store_dir.display()))?;
    Ok(CorpusHandle::from_persisted(persisted, embedder, default_tokenizer())?)
}

pub fn build_retriever(settings: RetrievalSettings) -> HybridRetriever {
    let reranker = Reranker::new(Arc::new(LexicalOverlapScorer::default()));
    HybridRetriever::new(settings, Some(reranker))
}

/// For "what does X stand for" queries, quote the phrase after "stands for"
/// in the top result with a `[source#local_index]` citation. Returns `None`
/// for any other kind of query.
pub fn extract_definition(query: &str, results: &[RankedResult]) -> Option<String> {
    if !is_definition_request(query) {
        return None;
    }
    let Some(top) = results.first() else {
        return Some(UNKNOWN_ANSWER.to_string());
    };
    let answer = phrase_after_stands_for(&top.text)
        .map(|phrase| format!("{} [{}#{}]", phrase, top.source, top.local_index))
        .unwrap_or_else(|| UNKNOWN_ANSWER.to_string());
    Some(answer)
}

fn phrase_after_stands_for(text: &str) -> Option<&str> {
    const NEEDLE: &str = "stands for";
    // ASCII lowering keeps byte offsets aligned with `text`.
    let at = text.to_ascii_lowercase().find(NEEDLE)?;
    let rest = &text[at + NEEDLE.len()..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let phrase = rest.trim();
    (!phrase.is_empty()).then_some(phrase)
}

pub fn print_results(retrieval: &Retrieval) {
    if retrieval.results.is_empty() {
        println!("No results.");
    }
    for r in &retrieval.results {
        let rerank = r.rerank_score.map(|s| format!("{s:.4}")).unwrap_or_else(|| "-".to_string());
        println!(
            "{}. [{}#{}] id={} hybrid={:.4} vector={:.4} lexical={:.4} rerank={}",
            r.rank, r.source, r.local_index, r.chunk_id, r.hybrid_score, r.signals.vector, r.signals.lexical, rerank
        );
        println!("   {}", r.text);
    }
    if retrieval.is_degraded() {
        println!(
            "(degraded: lexical={:?} vector={:?} rerank={:?})",
            retrieval.lexical, retrieval.vector, retrieval.rerank
        );
    }
}

pub fn print_json(retrieval: &Retrieval) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(retrieval)?);
    Ok(())
}
