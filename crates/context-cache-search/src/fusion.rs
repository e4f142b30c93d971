//! Reciprocal Rank Fusion (spec.md §4.9).
//!
//! Grounded on the teacher crate's `search-core::fusion` module: same
//! `1/(k + rank)` formula, same "insertion order breaks ties" discipline.
//! Trimmed of the teacher's per-source `FusionExplain`/`SourceContribution`
//! telemetry payload, which this spec has no consumer for.

use std::collections::HashMap;

/// Default Reciprocal Rank Fusion constant (spec.md §4.9, §6).
pub const DEFAULT_RRF_K: u32 = 60;

/// One fused result: an identifier and its combined RRF score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedEntry<T> {
    pub id: T,
    pub score: f64,
}

/// Fuses any number of ranked identifier lists into one ordered list.
///
/// `rank_ℓ(id)` is the zero-based position of `id` in list ℓ (spec.md
/// §4.9); a list's rank term is omitted entirely for ids absent from it.
/// Output is ordered by fused score descending; ties are broken by the
/// order in which an id was first seen across the input lists (insertion
/// order into the accumulator), matching the teacher's tie-break
/// discipline without re-deriving its lexical/doc-id tie-breakers, which
/// don't apply to a generic identifier type.
#[must_use]
pub fn fuse_rrf<T>(lists: &[&[T]], k: u32) -> Vec<FusedEntry<T>>
where
    T: std::hash::Hash + Eq + Clone,
{
    let k = f64::from(k);
    let mut scores: HashMap<T, f64> = HashMap::new();
    let mut order: Vec<T> = Vec::new();

    for list in lists {
        for (rank, id) in list.iter().enumerate() {
            let contribution = 1.0 / (k + rank as f64);
            if let Some(existing) = scores.get_mut(id) {
                *existing += contribution;
            } else {
                scores.insert(id.clone(), contribution);
                order.push(id.clone());
            }
        }
    }

    let mut indexed: Vec<(usize, T)> = order.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| {
        let sa = scores[&a.1];
        let sb = scores[&b.1];
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    indexed
        .into_iter()
        .map(|(_, id)| {
            let score = scores[&id];
            FusedEntry { id, score }
        })
        .collect()
}
