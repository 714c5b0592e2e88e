//! Text safety transform applied before any token is persisted or streamed.
//!
//! Deliberately blunt: a match replaces the whole turn with one fixed
//! fallback line rather than redacting in place, so there is never a
//! partially-delivered turn that later changes shape.

use std::borrow::Cow;

/// Phrases matched as case-insensitive substrings.
const BANNED_PHRASES: [&str; 3] = ["kill yourself", "die", "i will hurt you"];

/// Words matched only on word boundaries.
const BANNED_WORDS: [&str; 2] = ["idiot", "moron"];

/// Replacement text for any flagged turn.
pub const SAFE_FALLBACK: &str = "Message redacted by guardrails. Agent retries with a cleaner take.";

/// Moderate one turn's text.
///
/// Returns the text to deliver plus whether it was flagged. Unflagged text
/// passes through borrowed and unchanged; flagged text is replaced wholesale
/// with [`SAFE_FALLBACK`].
#[must_use]
pub fn moderate(text: &str) -> (Cow<'_, str>, bool) {
    let lowered = text.to_lowercase();
    for phrase in BANNED_PHRASES {
        if lowered.contains(phrase) {
            return (Cow::Borrowed(SAFE_FALLBACK), true);
        }
    }
    let mut words = lowered.split(|c: char| !c.is_alphanumeric() && c != '_');
    if words.any(|word| BANNED_WORDS.contains(&word)) {
        return (Cow::Borrowed(SAFE_FALLBACK), true);
    }
    (Cow::Borrowed(text), false)
}
