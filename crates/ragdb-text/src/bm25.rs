//! BM25 lexical scoring over an immutable chunk corpus, backed by an
//! in-memory tantivy index.
//!
//! Documents are analyzed with the corpus [`Tokenizer`] at build time, so
//! document frequencies, field norms and the average length are fixed by the
//! single commit in [`LexicalIndex::build`] and reused by every query.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use ragdb_core::traits::Tokenizer;
use ragdb_core::types::{Candidate, Chunk};
use tantivy::collector::TopDocs;
use tantivy::query::BooleanQuery;
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STORED};
use tantivy::tokenizer::{TextAnalyzer, Token, TokenStream};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tracing::debug;

const ANALYZER: &str = "ragdb_terms";
const WRITER_MEMORY_BYTES: usize = 20_000_000;

pub struct LexicalIndex {
    tokenizer: Arc<dyn Tokenizer>,
    searcher: Searcher,
    chunk_id: Field,
    text: Field,
    len: usize,
    avg_doc_len: f32,
}

fn build_schema() -> (Schema, Field, Field) {
    let mut schema_builder = Schema::builder();
    let chunk_id = schema_builder.add_u64_field("chunk_id", STORED);
    let text_indexing = TextFieldIndexing::default()
        .set_tokenizer(ANALYZER)
        .set_index_option(IndexRecordOption::WithFreqs)
        .set_fieldnorms(true);
    let text = schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(text_indexing));
    (schema_builder.build(), chunk_id, text)
}

/// Hands the output of a [`Tokenizer`] to tantivy's indexer.
#[derive(Clone)]
struct StrategyTokenizer(Arc<dyn Tokenizer>);

struct StrategyStream {
    terms: std::vec::IntoIter<String>,
    token: Token,
}

impl tantivy::tokenizer::Tokenizer for StrategyTokenizer {
    type TokenStream<'a> = StrategyStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> StrategyStream {
        StrategyStream { terms: self.0.tokenize(text).into_iter(), token: Token::default() }
    }
}

impl TokenStream for StrategyStream {
    fn advance(&mut self) -> bool {
        match self.terms.next() {
            Some(term) => {
                self.token.text = term;
                self.token.position = self.token.position.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

impl LexicalIndex {
    pub fn build(chunks: &[Chunk], tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let (schema, chunk_id, text) = build_schema();
        let index = Index::create_in_ram(schema);
        index
            .tokenizers()
            .register(ANALYZER, TextAnalyzer::builder(StrategyTokenizer(tokenizer.clone())).build());

        // One indexing thread keeps a single segment in insertion order.
        let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES)?;
        for chunk in chunks {
            writer.add_document(doc!(chunk_id => chunk.id, text => chunk.text.clone()))?;
        }
        writer.commit()?;

        let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
        let searcher = reader.searcher();
        let len = searcher.num_docs() as usize;
        let mut total_tokens = 0u64;
        for segment in searcher.segment_readers() {
            total_tokens += segment.inverted_index(text)?.total_num_tokens();
        }
        let avg_doc_len = if len == 0 { 0.0 } else { total_tokens as f32 / len as f32 };

        debug!(chunks = len, avg_doc_len, "built lexical index");
        Ok(Self { tokenizer, searcher, chunk_id, text, len, avg_doc_len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn avg_doc_len(&self) -> f32 {
        self.avg_doc_len
    }

    /// Top-`k` chunks by BM25 score, highest first, ties by ascending id.
    ///
    /// Only chunks sharing at least one term with the query are returned, so
    /// a query with no surviving tokens yields an empty set. Repeated query
    /// terms add their contribution once per occurrence.
    pub fn score(&self, query: &str, k: usize) -> Result<Vec<Candidate>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let terms: Vec<Term> = self
            .tokenizer
            .tokenize(query)
            .iter()
            .map(|t| Term::from_field_text(self.text, t))
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let term_count = terms.len();

        // Collect every match so ties straddling k resolve by chunk id.
        let query = BooleanQuery::new_multiterms_query(terms);
        let top_docs = self.searcher.search(&query, &TopDocs::with_limit(self.len))?;
        let mut candidates = Vec::with_capacity(top_docs.len());
        for (raw_score, address) in top_docs {
            let doc: TantivyDocument = self.searcher.doc(address)?;
            let chunk_id = doc
                .get_first(self.chunk_id)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| anyhow!("indexed document {:?} has no chunk_id", address))?;
            candidates.push(Candidate { chunk_id, raw_score });
        }
        candidates.sort_by(|a, b| b.raw_score.total_cmp(&a.raw_score).then(a.chunk_id.cmp(&b.chunk_id)));
        candidates.truncate(k);
        debug!(terms = term_count, hits = candidates.len(), "lexical scoring");
        Ok(candidates)
    }
}
