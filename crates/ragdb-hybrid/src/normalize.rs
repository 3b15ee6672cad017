use ragdb_core::types::{Candidate, NormalizedCandidate};

/// Divide every raw score by the set's maximum, clamping onto [0, 1].
///
/// A maximum that is zero, negative or not finite collapses the whole set to
/// 0.0 instead of producing NaN or inverted scores.
pub fn normalize(candidates: &[Candidate]) -> Vec<NormalizedCandidate> {
    let max = candidates.iter().map(|c| c.raw_score).fold(f32::NEG_INFINITY, f32::max);
    let usable = max.is_finite() && max > 0.0;
    candidates
        .iter()
        .map(|c| {
            let score = if usable && c.raw_score.is_finite() { (c.raw_score / max).clamp(0.0, 1.0) } else { 0.0 };
            NormalizedCandidate { chunk_id: c.chunk_id, score }
        })
        .collect()
}
