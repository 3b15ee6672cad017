use anyhow::Result;
use ragdb_core::error::Error;
use ragdb_core::traits::VectorSearch;
use ragdb_core::types::ChunkId;

/// Brute-force index over row-major vectors, scored by squared L2 distance.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    ids: Vec<ChunkId>,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, ids: Vec::new(), data: Vec::new() }
    }

    /// Build from parallel id and vector lists; the i-th vector belongs to the i-th id.
    pub fn from_vectors(dim: usize, ids: Vec<ChunkId>, vectors: Vec<Vec<f32>>) -> ragdb_core::error::Result<Self> {
        if ids.len() != vectors.len() {
            return Err(Error::CountMismatch { vectors: vectors.len(), metadata: ids.len() });
        }
        let mut index = Self::new(dim);
        index.ids.reserve(ids.len());
        index.data.reserve(ids.len() * dim);
        for (id, vector) in ids.into_iter().zip(vectors) {
            index.add(id, &vector)?;
        }
        Ok(index)
    }

    pub fn add(&mut self, id: ChunkId, vector: &[f32]) -> ragdb_core::error::Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, found: vector.len() });
        }
        self.ids.push(id);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl VectorSearch for FlatIndex {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    /// Nearest first; equal distances order by ascending id.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkId, f32)>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, found: query.len() }.into());
        }
        let mut hits: Vec<(ChunkId, f32)> =
            self.ids.iter().enumerate().map(|(i, &id)| (id, squared_l2(self.row(i), query))).collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }
}
