mod common;
use common::{make_badge, make_turn};

use quarrel::report::build_wrapped_report;

#[test]
fn empty_run_gets_the_fixed_placeholder() {
    let (summary, wrapped) = build_wrapped_report("tabs vs spaces", &[], &[]);
    assert_eq!(summary, "No valid turns were produced for: tabs vs spaces");
    assert_eq!(wrapped.who_cooked, "No one");
    assert_eq!(wrapped.most_stubborn_point, "No argument data");
    assert_eq!(wrapped.unexpected_common_ground, "No overlap found");
    assert!(wrapped.momentum_shift_turn.is_none());
    assert!(wrapped.best_receipts.is_empty());
    assert!(wrapped.highlights.is_empty());
}

#[test]
fn winner_is_speaker_with_most_turns() {
    let turns = vec![
        make_turn("r", 1, "ada", "one"),
        make_turn("r", 2, "lin", "two"),
        make_turn("r", 3, "ada", "three"),
    ];
    let (_, wrapped) = build_wrapped_report("topic", &turns, &[]);
    assert_eq!(wrapped.who_cooked, "ada");
}

#[test]
fn turn_count_ties_go_to_first_speaker() {
    let turns = vec![
        make_turn("r", 1, "ada", "one"),
        make_turn("r", 2, "lin", "two"),
        make_turn("r", 3, "ada", "three"),
        make_turn("r", 4, "lin", "four"),
    ];
    let (_, wrapped) = build_wrapped_report("topic", &turns, &[]);
    assert_eq!(wrapped.who_cooked, "ada");
}

#[test]
fn receipts_and_highlights_take_leading_turns() {
    let turns: Vec<_> = (1..=6)
        .map(|i| make_turn("r", i, "ada", &format!("turn number {i}")))
        .collect();
    let (summary, wrapped) = build_wrapped_report("topic", &turns, &[]);

    assert_eq!(wrapped.best_receipts.len(), 3);
    assert_eq!(wrapped.best_receipts[0], "turn number 1");
    assert_eq!(wrapped.highlights.len(), 4);
    assert_eq!(wrapped.highlights[0], "Turn 1: turn number 1");
    assert_eq!(wrapped.momentum_shift_turn, Some(3));
    assert!(summary.contains("6 turns exchanged with 0 heat moments"));
}

#[test]
fn badge_streak_line_is_appended_when_badges_exist() {
    let turns = vec![
        make_turn("r", 1, "ada", "one"),
        make_turn("r", 2, "lin", "two"),
    ];
    let badges = vec![
        make_badge("r", "t1", 1, "mic_drop"),
        make_badge("r", "t2", 2, "calm_sniper"),
    ];
    let (_, wrapped) = build_wrapped_report("topic", &turns, &badges);
    assert_eq!(
        wrapped.highlights.last().map(String::as_str),
        Some("Badge streak: mic_drop, calm_sniper"),
    );
}

#[test]
fn at_most_three_badge_keys_are_named() {
    let turns = vec![make_turn("r", 1, "ada", "one"), make_turn("r", 2, "lin", "two")];
    let badges: Vec<_> = (1..=4)
        .map(|i| make_badge("r", "t", i, &format!("badge_{i}")))
        .collect();
    let (_, wrapped) = build_wrapped_report("topic", &turns, &badges);
    let line = wrapped.highlights.last().expect("badge line");
    assert_eq!(line, "Badge streak: badge_1, badge_2, badge_3");
}

#[test]
fn stubborn_point_and_highlights_are_truncated() {
    let long = "x".repeat(500);
    let turns: Vec<_> = (1..=4).map(|i| make_turn("r", i, "ada", &long)).collect();
    let (_, wrapped) = build_wrapped_report("topic", &turns, &[]);

    assert_eq!(wrapped.most_stubborn_point.chars().count(), 120);
    // "Turn 1: " prefix plus 140 chars of content.
    assert_eq!(wrapped.highlights[0].chars().count(), "Turn 1: ".len() + 140);
}

#[test]
fn momentum_shift_has_a_floor_of_two() {
    let turns = vec![
        make_turn("r", 1, "ada", "one"),
        make_turn("r", 2, "lin", "two"),
    ];
    let (_, wrapped) = build_wrapped_report("topic", &turns, &[]);
    assert_eq!(wrapped.momentum_shift_turn, Some(2));
}

#[test]
fn single_turn_uses_the_last_index_for_stubborn_point() {
    let turns = vec![make_turn("r", 1, "ada", "only point standing")];
    let (_, wrapped) = build_wrapped_report("topic", &turns, &[]);
    assert_eq!(wrapped.most_stubborn_point, "only point standing");
}

#[test]
fn report_payload_round_trips_as_json() {
    let turns = vec![
        make_turn("r", 1, "ada", "one"),
        make_turn("r", 2, "lin", "two"),
    ];
    let (_, wrapped) = build_wrapped_report("topic", &turns, &[]);
    let raw = serde_json::to_string(&wrapped).expect("serialize");
    let back: quarrel::report::WrappedReport = serde_json::from_str(&raw).expect("deserialize");
    assert_eq!(back, wrapped);
}
