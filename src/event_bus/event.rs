//! Wire event shape shared by persistence, live streaming, and replay.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The fixed event vocabulary any outer transport must carry unmodified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "phase.changed")]
    PhaseChanged,
    #[serde(rename = "turn.meta")]
    TurnMeta,
    #[serde(rename = "turn.token")]
    TurnToken,
    #[serde(rename = "turn.final")]
    TurnFinal,
    #[serde(rename = "badge.awarded")]
    BadgeAwarded,
    #[serde(rename = "reaction.added")]
    ReactionAdded,
    #[serde(rename = "run.completed")]
    RunCompleted,
    #[serde(rename = "error")]
    Error,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PhaseChanged => "phase.changed",
            EventKind::TurnMeta => "turn.meta",
            EventKind::TurnToken => "turn.token",
            EventKind::TurnFinal => "turn.final",
            EventKind::BadgeAwarded => "badge.awarded",
            EventKind::ReactionAdded => "reaction.added",
            EventKind::RunCompleted => "run.completed",
            EventKind::Error => "error",
        }
    }

    /// Decode a persisted kind string; unknown strings become `Error`.
    pub fn decode(s: &str) -> Self {
        match s {
            "phase.changed" => EventKind::PhaseChanged,
            "turn.meta" => EventKind::TurnMeta,
            "turn.token" => EventKind::TurnToken,
            "turn.final" => EventKind::TurnFinal,
            "badge.awarded" => EventKind::BadgeAwarded,
            "reaction.added" => EventKind::ReactionAdded,
            "run.completed" => EventKind::RunCompleted,
            _ => EventKind::Error,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only run event: the single source of truth for both live
/// delivery and historical replay.
///
/// `id` is assigned by the store and is strictly increasing per run, which
/// is what lets late joiners stitch history and live delivery together
/// without gaps or duplicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub id: i64,
    pub run_id: String,
    pub kind: EventKind,
    pub turn_index: Option<u32>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl WireEvent {
    /// Compact JSON form used on the durable broker path.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
