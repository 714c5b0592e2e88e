//! Rule-based badge awards.
//!
//! Rules live in a fixed-priority table evaluated top-down; the first
//! matching rule wins. Evaluation is skipped entirely while the cooldown is
//! hot or once the per-run badge budget is spent, and an award only counts
//! when its confidence clears [`AWARD_THRESHOLD`].

use crate::types::EvidenceMode;

/// Maximum badges per run.
pub const BADGE_LIMIT: usize = 4;

/// Minimum confidence for an award to be persisted and announced.
pub const AWARD_THRESHOLD: f64 = 0.68;

/// Turns of cooldown imposed after every award.
pub const COOLDOWN_TURNS: u32 = 2;

/// Inputs a rule may inspect for one turn.
#[derive(Clone, Copy, Debug)]
pub struct BadgeContext<'a> {
    pub turn_text: &'a str,
    pub previous_turn_text: Option<&'a str>,
    pub evidence_mode: EvidenceMode,
    pub composure: u8,
    pub turn_index: u32,
}

/// A rule's verdict: which badge, why, and how confident.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BadgeDecision {
    pub badge_key: &'static str,
    pub reason: &'static str,
    pub confidence: f64,
}

/// Pre-lowered view of the turn text shared by all predicates.
struct RuleInput<'a> {
    ctx: &'a BadgeContext<'a>,
    trimmed: &'a str,
    lowered: &'a str,
}

struct BadgeRule {
    badge_key: &'static str,
    reason: &'static str,
    confidence: f64,
    matches: fn(&RuleInput<'_>) -> bool,
}

/// Ordered rule table; order is priority, first match wins.
const RULES: [BadgeRule; 4] = [
    BadgeRule {
        badge_key: "receipt_slinger",
        reason: "Brought concrete receipts when needed.",
        confidence: 0.84,
        matches: |input| {
            input.ctx.evidence_mode == EvidenceMode::ReceiptsPreferred
                && ["source", "data", "stat"]
                    .iter()
                    .any(|needle| input.lowered.contains(needle))
        },
    },
    BadgeRule {
        badge_key: "mic_drop",
        reason: "Sharp closer with quotable impact.",
        confidence: 0.78,
        matches: |input| {
            input.trimmed.chars().count() > 180
                && input.trimmed.ends_with('.')
                && input.ctx.composure < 45
        },
    },
    BadgeRule {
        badge_key: "calm_sniper",
        reason: "Stayed cool while landing clean counters.",
        confidence: 0.73,
        matches: |input| {
            input.ctx.composure < 35
                && !input.trimmed.contains('!')
                && input.lowered.contains("you")
        },
    },
    BadgeRule {
        badge_key: "combo_chain",
        reason: "Built on previous points with momentum.",
        confidence: 0.69,
        matches: |input| {
            input.ctx.previous_turn_text.is_some_and(|prev| !prev.is_empty())
                && input.ctx.turn_index > 2
                && ["building on", "as you said", "exactly"]
                    .iter()
                    .any(|needle| input.lowered.contains(needle))
        },
    },
];

/// Evaluate the rule table for one turn.
///
/// Returns `None` unconditionally while `cooldown_remaining > 0` or once
/// `badges_so_far` has reached [`BADGE_LIMIT`].
#[must_use]
pub fn maybe_award_badge(
    ctx: &BadgeContext<'_>,
    cooldown_remaining: u32,
    badges_so_far: usize,
) -> Option<BadgeDecision> {
    if cooldown_remaining > 0 || badges_so_far >= BADGE_LIMIT {
        return None;
    }

    let trimmed = ctx.turn_text.trim();
    let lowered = trimmed.to_lowercase();
    let input = RuleInput {
        ctx,
        trimmed,
        lowered: &lowered,
    };

    RULES
        .iter()
        .find(|rule| (rule.matches)(&input))
        .map(|rule| BadgeDecision {
            badge_key: rule.badge_key,
            reason: rule.reason,
            confidence: rule.confidence,
        })
}

/// Per-run award bookkeeping: cooldown decay and the badge budget.
#[derive(Debug, Default)]
pub struct BadgeLedger {
    cooldown_remaining: u32,
    awarded: usize,
}

impl BadgeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the rule table and apply cooldown/budget bookkeeping.
    ///
    /// Only decisions clearing [`AWARD_THRESHOLD`] are returned; an award
    /// resets the cooldown to [`COOLDOWN_TURNS`], any other turn decays it
    /// by one (floored at zero).
    pub fn evaluate(&mut self, ctx: &BadgeContext<'_>) -> Option<BadgeDecision> {
        let decision = maybe_award_badge(ctx, self.cooldown_remaining, self.awarded)
            .filter(|d| d.confidence >= AWARD_THRESHOLD);
        match decision {
            Some(decision) => {
                self.awarded += 1;
                self.cooldown_remaining = COOLDOWN_TURNS;
                Some(decision)
            }
            None => {
                self.cooldown_remaining = self.cooldown_remaining.saturating_sub(1);
                None
            }
        }
    }

    #[must_use]
    pub fn awarded(&self) -> usize {
        self.awarded
    }

    #[must_use]
    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown_remaining
    }
}
