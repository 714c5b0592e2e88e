//! Pure per-turn heuristics: phase classification and text similarity.
//!
//! Everything here is deterministic and allocation-light so the orchestrator
//! can call it on every turn without ceremony. The constants are a tuned
//! heuristic surface; they are intentionally kept verbatim rather than
//! re-derived.

use rustc_hash::FxHashMap;

use crate::types::Phase;

/// Classify the coarse phase for a 1-based turn position.
///
/// Opening holds while `turn_index <= max(2, max_turns / 3)` (integer
/// division), resolution starts once `turn_index > max_turns - 2`, and
/// everything between is escalation. The result is monotone in `turn_index`,
/// so a run's phase never moves backwards.
#[must_use]
pub fn compute_phase(turn_index: u32, max_turns: u32) -> Phase {
    let turn_index = i64::from(turn_index);
    let max_turns = i64::from(max_turns);
    if turn_index <= (max_turns / 3).max(2) {
        Phase::Opening
    } else if turn_index <= max_turns - 2 {
        Phase::Escalation
    } else {
        Phase::Resolution
    }
}

/// Cosine similarity over lower-cased, whitespace-tokenized term frequencies.
///
/// Returns 0.0 when either side is blank. Used to compare a turn against the
/// immediately preceding one when scoring stagnation.
#[must_use]
pub fn cosine_similarity(a: &str, b: &str) -> f64 {
    if a.trim().is_empty() || b.trim().is_empty() {
        return 0.0;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let a_counts = term_counts(&a);
    let b_counts = term_counts(&b);

    let dot: f64 = a_counts
        .iter()
        .map(|(term, count)| {
            f64::from(*count) * f64::from(b_counts.get(term).copied().unwrap_or(0))
        })
        .sum();
    let norm_a = norm(&a_counts);
    let norm_b = norm(&b_counts);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn term_counts(text: &str) -> FxHashMap<&str, u32> {
    let mut counts = FxHashMap::default();
    for token in text.split_whitespace() {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

fn norm(counts: &FxHashMap<&str, u32>) -> f64 {
    counts
        .values()
        .map(|v| f64::from(*v) * f64::from(*v))
        .sum::<f64>()
        .sqrt()
}
