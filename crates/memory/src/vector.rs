//! Vector similarity utilities.
//!
//! Pure-Rust implementations of cosine similarity and the distance-based
//! ranking every long-term store uses. Distance is `1 − cosine`, so it lies
//! in [0, 2] and lower means closer.

use std::cmp::Ordering;
use tandem_core::memory::{LongTermEntry, ScoredLongTerm};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the vectors differ in length, are empty, or either has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// `1 − cosine_similarity`, clamped to [0, 2].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0)
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Rank entries by distance to a query embedding, closest first.
pub fn rank_by_distance<'a, I>(entries: I, query: &[f32], top_k: usize) -> Vec<ScoredLongTerm>
where
    I: IntoIterator<Item = &'a LongTermEntry>,
{
    let mut scored: Vec<ScoredLongTerm> = entries
        .into_iter()
        .map(|entry| ScoredLongTerm {
            distance: cosine_distance(&entry.embedding, query),
            entry: entry.clone(),
        })
        .collect();

    scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}
