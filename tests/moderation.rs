use quarrel::moderation::{SAFE_FALLBACK, moderate};

#[test]
fn clean_text_passes_through_unchanged() {
    let (text, flagged) = moderate("A perfectly reasonable rebuttal.");
    assert!(!flagged);
    assert_eq!(text, "A perfectly reasonable rebuttal.");
}

#[test]
fn banned_phrase_replaces_whole_text() {
    let (text, flagged) = moderate("honestly you should just DIE already");
    assert!(flagged);
    assert_eq!(text, SAFE_FALLBACK);
}

#[test]
fn phrase_match_is_substring_based() {
    // "die" matches inside larger words as well; the filter is blunt on purpose.
    let (_, flagged) = moderate("that argument will diet itself into nothing");
    assert!(flagged);
}

#[test]
fn banned_word_requires_word_boundary() {
    let (_, flagged) = moderate("you absolute idiot");
    assert!(flagged);

    // Not a standalone word, so the word rule does not fire.
    let (text, flagged) = moderate("idiomatic code wins arguments");
    assert!(!flagged);
    assert_eq!(text, "idiomatic code wins arguments");
}

#[test]
fn word_match_ignores_punctuation() {
    let (_, flagged) = moderate("nice take, moron!");
    assert!(flagged);
}

#[test]
fn matching_is_case_insensitive() {
    let (_, flagged) = moderate("MORON");
    assert!(flagged);
    let (_, flagged) = moderate("I Will Hurt You");
    assert!(flagged);
}
