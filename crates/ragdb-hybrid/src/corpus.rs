//! Immutable corpus snapshots and the slot that swaps them.
//!
//! A [`CorpusHandle`] bundles chunks with every structure derived from them
//! (lexical index, vector adapter). Queries hold a handle for their whole
//! lifetime; a rebuild installs a new handle in the [`CorpusSlot`] without
//! disturbing queries still running against the old one.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock};

use ragdb_core::error::{Error, Result};
use ragdb_core::store::{self, PersistedCorpus};
use ragdb_core::traits::{Embedder, Tokenizer, VectorSearch};
use ragdb_core::types::{Chunk, ChunkId};
use ragdb_text::LexicalIndex;
use ragdb_vector::{FlatIndex, VectorAdapter};
use tracing::info;

pub struct CorpusIndex {
    chunks: Vec<Chunk>,
    positions: HashMap<ChunkId, usize>,
    lexical: LexicalIndex,
    vector: VectorAdapter,
}

/// Cheap-to-clone shared reference to one corpus snapshot.
#[derive(Clone)]
pub struct CorpusHandle(Arc<CorpusIndex>);

impl Deref for CorpusHandle {
    type Target = CorpusIndex;

    fn deref(&self) -> &CorpusIndex {
        &self.0
    }
}

impl CorpusHandle {
    /// Build a snapshot over `chunks` and an externally built vector index
    /// holding exactly one entry per chunk.
    pub fn build(
        chunks: Vec<Chunk>,
        index: Arc<dyn VectorSearch>,
        embedder: Arc<dyn Embedder>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        store::validate_chunks(&chunks)?;
        if index.len() != chunks.len() {
            return Err(Error::CountMismatch { vectors: index.len(), metadata: chunks.len() });
        }
        let vector = VectorAdapter::new(embedder, index)?;
        let lexical = LexicalIndex::build(&chunks, tokenizer)
            .map_err(|e| Error::Operation(format!("failed to build lexical index: {e:#}")))?;
        let positions = chunks.iter().enumerate().map(|(i, c)| (c.id, i)).collect();
        info!("Corpus ready: {} chunks, {} indexed vectors", chunks.len(), vector.len());
        Ok(Self(Arc::new(CorpusIndex { chunks, positions, lexical, vector })))
    }

    /// Build a snapshot from a store loaded with [`store::load`], using an
    /// exact [`FlatIndex`] over the persisted vectors.
    pub fn from_persisted(
        persisted: PersistedCorpus,
        embedder: Arc<dyn Embedder>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        let ids = persisted.chunks.iter().map(|c| c.id).collect();
        let index = FlatIndex::from_vectors(persisted.vectors.dim, ids, persisted.vectors.vectors)?;
        Self::build(persisted.chunks, Arc::new(index), embedder, tokenizer)
    }

    pub fn empty(embedder: Arc<dyn Embedder>, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let dim = embedder.dim();
        Self::build(Vec::new(), Arc::new(FlatIndex::new(dim)), embedder, tokenizer)
    }
}

impl CorpusIndex {
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.positions.get(&id).map(|&i| &self.chunks[i])
    }

    pub fn text(&self, id: ChunkId) -> Option<&str> {
        self.chunk(id).map(|c| c.text.as_str())
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub fn vector(&self) -> &VectorAdapter {
        &self.vector
    }
}

/// Holder of the current corpus. Readers take a handle and release the lock
/// immediately; a rebuild runs outside the lock and swaps in one step.
pub struct CorpusSlot {
    current: RwLock<CorpusHandle>,
}

impl CorpusSlot {
    pub fn new(handle: CorpusHandle) -> Self {
        Self { current: RwLock::new(handle) }
    }

    pub fn current(&self) -> CorpusHandle {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Install `handle`, returning the one it replaced.
    pub fn replace(&self, handle: CorpusHandle) -> CorpusHandle {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, handle)
    }

    /// Build a new snapshot with `build` and install it. On error the current
    /// snapshot stays in place.
    pub fn rebuild<F>(&self, build: F) -> Result<CorpusHandle>
    where
        F: FnOnce() -> Result<CorpusHandle>,
    {
        let fresh = build()?;
        self.replace(fresh.clone());
        info!("Corpus swapped: {} chunks", fresh.len());
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragdb_text::SimpleTokenizer;

    struct ZeroEmbedder;

    impl Embedder for ZeroEmbedder {
        fn dim(&self) -> usize { 2 }
        fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0, 0.0]).collect())
        }
    }

    fn chunk(id: ChunkId, text: &str) -> Chunk {
        Chunk { id, text: text.into(), source: "doc".into(), local_index: id as usize }
    }

    fn handle(chunks: Vec<Chunk>) -> Result<CorpusHandle> {
        let ids = chunks.iter().map(|c| c.id).collect();
        let vectors = chunks.iter().map(|_| vec![0.0, 0.0]).collect();
        let index = FlatIndex::from_vectors(2, ids, vectors)?;
        CorpusHandle::build(chunks, Arc::new(index), Arc::new(ZeroEmbedder), Arc::new(SimpleTokenizer::new()))
    }

    #[test]
    fn lookup_by_id() {
        let corpus = handle(vec![chunk(4, "four"), chunk(9, "nine")]).expect("corpus");
        assert_eq!(corpus.text(9), Some("nine"));
        assert!(corpus.chunk(5).is_none());
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn count_mismatch_is_fatal() {
        let index = FlatIndex::from_vectors(2, vec![0], vec![vec![0.0, 0.0]]).expect("index");
        let err = CorpusHandle::build(
            vec![chunk(0, "a"), chunk(1, "b")],
            Arc::new(index),
            Arc::new(ZeroEmbedder),
            Arc::new(SimpleTokenizer::new()),
        )
        .err();
        assert!(matches!(err, Some(Error::CountMismatch { vectors: 1, metadata: 2 })));
    }

    #[test]
    fn duplicate_ids_are_fatal() {
        assert!(matches!(handle(vec![chunk(1, "a"), Chunk { local_index: 7, ..chunk(1, "b") }]).err(), Some(Error::DuplicateChunkId(1))));
    }

    #[test]
    fn swap_leaves_old_handles_intact() {
        let slot = CorpusSlot::new(handle(vec![chunk(0, "old")]).expect("corpus"));
        let before = slot.current();
        slot.rebuild(|| handle(vec![chunk(0, "new"), chunk(1, "newer")])).expect("rebuild");
        assert_eq!(before.text(0), Some("old"));
        assert_eq!(slot.current().text(0), Some("new"));
        assert_eq!(slot.current().len(), 2);
    }

    #[test]
    fn failed_rebuild_keeps_current() {
        let slot = CorpusSlot::new(handle(vec![chunk(0, "old")]).expect("corpus"));
        assert!(slot.rebuild(|| Err(Error::Operation("boom".into()))).is_err());
        assert_eq!(slot.current().text(0), Some("old"));
    }
}
