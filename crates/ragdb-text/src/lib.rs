//! ragdb-text
//!
//! Tantivy-backed BM25 lexical index with pluggable tokenizer strategies.

pub mod bm25;
pub mod tokenize;

pub use bm25::LexicalIndex;
pub use tokenize::{AsciiAlnumTokenizer, SimpleTokenizer, StemmingTokenizer, TrailingSFilter, STOP_WORDS};
