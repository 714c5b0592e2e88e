//! Stagnation and completion detection.
//!
//! Two trackers feed the stop decision that is checked after every turn:
//!
//! - [`ClaimTracker`] decides which defend point a speaker uses next and
//!   whether that choice still counts as novel.
//! - [`StagnationTracker`] folds per-turn signals (similarity to the previous
//!   turn, claim novelty, done hints) into a run-wide stagnation counter and
//!   per-speaker done streaks.
//!
//! The thresholds here interact as a tuned heuristic; keep them verbatim.

use rustc_hash::{FxHashMap, FxHashSet};

/// Similarity above which a non-novel turn counts as stagnation.
pub const SIMILARITY_THRESHOLD: f64 = 0.9;

/// Consecutive done-hinted turns a speaker needs before counting as done.
pub const DONE_STREAK_TARGET: u32 = 2;

/// Stagnation hits that force early termination.
pub const STAGNATION_LIMIT: u32 = 2;

/// Fraction of `max_turns` after which recycled claims carry a done hint.
pub const DONE_HINT_FRACTION: f64 = 0.6;

/// Outcome of selecting a claim for one turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimSelection {
    /// Index into the speaker's padded claim set.
    pub index: usize,
    /// True when this claim had not been used by this speaker before.
    pub is_new: bool,
    /// True once the speaker is recycling claims late in the run.
    pub done_hint: bool,
}

/// Tracks which claim indices each speaker has already used.
#[derive(Debug, Default)]
pub struct ClaimTracker {
    used: FxHashMap<String, FxHashSet<usize>>,
}

impl ClaimTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the claim index for a speaker's turn and record its use.
    ///
    /// The first unused index wins. Once all are used, selection cycles
    /// deterministically via `(turn_index + seat_order) % claim_count`, and
    /// the done hint turns on once `turn_index > 0.6 * max_turns`.
    pub fn select(
        &mut self,
        speaker_id: &str,
        seat_order: u32,
        turn_index: u32,
        max_turns: u32,
        claim_count: usize,
    ) -> ClaimSelection {
        let used = self.used.entry(speaker_id.to_string()).or_default();
        let (index, done_hint) = match (0..claim_count).find(|idx| !used.contains(idx)) {
            Some(unused) => (unused, false),
            None => {
                let cycled = (turn_index + seat_order) as usize % claim_count.max(1);
                let hint = f64::from(turn_index) > f64::from(max_turns) * DONE_HINT_FRACTION;
                (cycled, hint)
            }
        };
        let is_new = !used.contains(&index);
        used.insert(index);
        ClaimSelection {
            index,
            is_new,
            done_hint,
        }
    }
}

/// Run-wide stagnation counter plus per-speaker done streaks.
#[derive(Debug, Default)]
pub struct StagnationTracker {
    stagnation_hits: u32,
    done_streaks: FxHashMap<String, u32>,
}

impl StagnationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one finished turn into the trackers.
    ///
    /// Stagnation increments when the turn is a near-duplicate of its
    /// predecessor (`similarity > 0.9`) and the claim was not new; otherwise
    /// it decays by one, floored at zero. The speaker's done streak grows
    /// only on hinted, non-novel turns and resets otherwise.
    pub fn observe(&mut self, speaker_id: &str, similarity: f64, is_new_claim: bool, done_hint: bool) {
        if similarity > SIMILARITY_THRESHOLD && !is_new_claim {
            self.stagnation_hits += 1;
        } else {
            self.stagnation_hits = self.stagnation_hits.saturating_sub(1);
        }

        let streak = self.done_streaks.entry(speaker_id.to_string()).or_insert(0);
        if done_hint && !is_new_claim {
            *streak += 1;
        } else {
            *streak = 0;
        }
    }

    /// Stop condition: every listed speaker is done-streaked, or the run has
    /// hit the stagnation limit.
    #[must_use]
    pub fn should_stop<'a>(&self, speaker_ids: impl IntoIterator<Item = &'a str>) -> bool {
        let everyone_done = speaker_ids.into_iter().all(|id| {
            self.done_streaks.get(id).copied().unwrap_or(0) >= DONE_STREAK_TARGET
        });
        everyone_done || self.stagnation_hits >= STAGNATION_LIMIT
    }

    #[must_use]
    pub fn stagnation_hits(&self) -> u32 {
        self.stagnation_hits
    }

    #[must_use]
    pub fn done_streak(&self, speaker_id: &str) -> u32 {
        self.done_streaks.get(speaker_id).copied().unwrap_or(0)
    }
}
