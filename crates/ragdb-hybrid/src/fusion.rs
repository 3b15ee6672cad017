//! Weighted-sum fusion of normalized signal sets.

use std::collections::BTreeMap;

use ragdb_core::types::{ChunkId, FusedResult, NormalizedCandidate, SignalScores};

/// Merge the vector and lexical sets over the union of their ids.
///
/// `hybrid = weight * vector + (1 - weight) * lexical`; a missing signal
/// counts as 0.0 and duplicate ids within one set keep their best score.
/// Output is ordered by descending hybrid score, then ascending id, with
/// 1-based ranks.
pub fn fuse(vector: &[NormalizedCandidate], lexical: &[NormalizedCandidate], weight: f32) -> Vec<FusedResult> {
    let weight = weight.clamp(0.0, 1.0);
    let mut by_id: BTreeMap<ChunkId, SignalScores> = BTreeMap::new();
    for c in vector {
        let entry = by_id.entry(c.chunk_id).or_default();
        entry.vector = entry.vector.max(c.score);
    }
    for c in lexical {
        let entry = by_id.entry(c.chunk_id).or_default();
        entry.lexical = entry.lexical.max(c.score);
    }

    let mut fused: Vec<FusedResult> = by_id
        .into_iter()
        .map(|(chunk_id, signals)| FusedResult {
            chunk_id,
            hybrid_score: weight * signals.vector + (1.0 - weight) * signals.lexical,
            signals,
            rank: 0,
        })
        .collect();
    // BTreeMap iteration is id-ascending, so a stable sort keeps that as the tie-break.
    fused.sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));
    for (i, r) in fused.iter_mut().enumerate() {
        r.rank = i + 1;
    }
    fused
}

/// [`fuse`] followed by truncation to `top_k`.
pub fn fuse_top(vector: &[NormalizedCandidate], lexical: &[NormalizedCandidate], weight: f32, top_k: usize) -> Vec<FusedResult> {
    let mut fused = fuse(vector, lexical, weight);
    fused.truncate(top_k);
    fused
}
