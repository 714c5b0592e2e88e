//! Post-run summary ("wrapped") report builder.
//!
//! Pure over a run's completed turns and badges; the runtime invokes it once
//! after completion and upserts the result, so recomputation replaces the
//! prior report instead of duplicating it.

use serde::{Deserialize, Serialize};

use crate::model::{BadgeAward, Turn};

/// Structured report payload surfaced to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WrappedReport {
    pub who_cooked: String,
    pub best_receipts: Vec<String>,
    pub most_stubborn_point: String,
    pub unexpected_common_ground: String,
    pub momentum_shift_turn: Option<u32>,
    pub highlights: Vec<String>,
}

const COMMON_GROUND: &str = "Both sides agreed momentum matters more than perfect certainty.";

/// Build the summary line and wrapped payload for a finished run.
///
/// With no turns at all, returns the fixed placeholder (`who_cooked` "No
/// one", no momentum shift). Otherwise the winner is the speaker with the
/// most turns, ties going to whoever reached the count first.
#[must_use]
pub fn build_wrapped_report(
    topic: &str,
    turns: &[Turn],
    badges: &[BadgeAward],
) -> (String, WrappedReport) {
    if turns.is_empty() {
        let summary = format!("No valid turns were produced for: {topic}");
        let wrapped = WrappedReport {
            who_cooked: "No one".to_string(),
            best_receipts: Vec::new(),
            most_stubborn_point: "No argument data".to_string(),
            unexpected_common_ground: "No overlap found".to_string(),
            momentum_shift_turn: None,
            highlights: Vec::new(),
        };
        return (summary, wrapped);
    }

    let winner = winner_by_turn_count(turns);
    let best_receipts: Vec<String> = turns.iter().take(3).map(|t| t.content.clone()).collect();
    let mut highlights: Vec<String> = turns
        .iter()
        .take(4)
        .map(|t| format!("Turn {}: {}", t.turn_index, truncate_chars(&t.content, 140)))
        .collect();

    let badge_bits: Vec<&str> = badges.iter().take(3).map(|b| b.badge_key.as_str()).collect();
    if !badge_bits.is_empty() {
        highlights.push(format!("Badge streak: {}", badge_bits.join(", ")));
    }

    let stubborn_idx = (turns.len() / 2).max(1).min(turns.len() - 1);
    let most_stubborn_point = truncate_chars(&turns[stubborn_idx].content, 120);
    let momentum_shift_turn = Some(((turns.len() / 2) as u32).max(2));

    let summary = format!(
        "Spicy, mostly coherent, and unexpectedly productive. {} turns exchanged with {} heat moments.",
        turns.len(),
        badges.len()
    );
    let wrapped = WrappedReport {
        who_cooked: winner,
        best_receipts,
        most_stubborn_point,
        unexpected_common_ground: COMMON_GROUND.to_string(),
        momentum_shift_turn,
        highlights,
    };
    (summary, wrapped)
}

/// Speaker with the most turns; ties break to first appearance order.
fn winner_by_turn_count(turns: &[Turn]) -> String {
    let mut order: Vec<&str> = Vec::new();
    for turn in turns {
        let speaker = turn.speaker_participant_id.as_str();
        if !order.contains(&speaker) {
            order.push(speaker);
        }
    }
    let count_for = |speaker: &str| {
        turns
            .iter()
            .filter(|t| t.speaker_participant_id == speaker)
            .count()
    };
    let mut winner = order[0];
    let mut best = count_for(winner);
    for speaker in order.iter().skip(1) {
        let count = count_for(speaker);
        if count > best {
            winner = speaker;
            best = count;
        }
    }
    winner.to_string()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
