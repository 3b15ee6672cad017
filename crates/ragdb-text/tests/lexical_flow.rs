use std::fs;
use std::sync::Arc;

use ragdb_core::data_processor::DataProcessor;
use ragdb_text::{LexicalIndex, StemmingTokenizer};
use tempfile::TempDir;

#[test]
fn lexical_index_over_processed_directory() {
    let tmp = TempDir::new().expect("tmp");
    fs::write(tmp.path().join("a.txt"), "RAG stands for Retrieval-Augmented Generation.").expect("write");
    fs::write(tmp.path().join("b.txt"), "BM25 ranks documents by term frequency and rarity.").expect("write");
    fs::write(tmp.path().join("c.txt"), "Dense vectors capture meaning beyond exact words.").expect("write");

    let chunks = DataProcessor::new().process_directory(tmp.path()).expect("process");
    let index = LexicalIndex::build(&chunks, Arc::new(StemmingTokenizer::new())).expect("index");
    assert_eq!(index.len(), chunks.len());

    let hits = index.score("How does BM25 rank documents?", 10).expect("score");
    eprintln!("lexical: {} hits", hits.len());
    assert_eq!(hits.len(), 1);
    let top = chunks.iter().find(|c| c.id == hits[0].chunk_id).expect("chunk");
    assert!(top.source.ends_with("b.txt"));
}
