//! Domain records for runs, participants, turns, badges, and reports.
//!
//! These are serde-friendly value types shared by the orchestrator and the
//! [`RunStore`](crate::store::RunStore) collaborators. Convenience
//! constructors mint ids with `uuid` and stamp `chrono` timestamps so call
//! sites stay declarative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{DebateShape, Phase, RunControls, RunStatus};

/// Fallback defend points used when a participant has no persona snapshot.
pub const DEFAULT_DEFEND_POINTS: [&str; 3] = [
    "I refuse to yield this ground",
    "This tradeoff is unacceptable",
    "The burden of proof is unmet",
];

/// Padding line appended when a persona supplies fewer than three points.
pub const PADDING_POINT: &str = "This is still unresolved";

const DEFAULT_STANCE: &str = "I stand by my position";

/// One complete multi-party debate execution under a topic and control set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub topic: String,
    pub status: RunStatus,
    pub phase: Phase,
    pub controls: RunControls,
    pub max_turns: u32,
    pub target_min_tokens: u32,
    pub target_max_tokens: u32,
    pub turn_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Run {
    /// Create a `Waiting` run with the given shape's turn and token budget.
    #[must_use]
    pub fn new(topic: impl Into<String>, shape: DebateShape, controls: RunControls) -> Self {
        let budget = shape.config();
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.into(),
            status: RunStatus::Waiting,
            phase: Phase::Opening,
            controls,
            max_turns: budget.max_turns,
            target_min_tokens: budget.min_tokens,
            target_max_tokens: budget.max_tokens,
            turn_count: 0,
            started_at: None,
            ended_at: None,
            created_at: Utc::now(),
        }
    }

    /// Claim the run for execution: `Waiting` -> `Running` with a start stamp.
    pub fn claim(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }
}

/// Persona snapshot frozen onto a participant when the run starts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    #[serde(default)]
    pub stance: String,
    #[serde(default)]
    pub defend_points: Vec<String>,
    #[serde(default)]
    pub red_lines: Vec<String>,
}

/// A seated debate participant with an immutable persona snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub run_id: String,
    pub user_handle: String,
    pub seat_order: u32,
    pub ready: bool,
    pub persona: Option<PersonaSnapshot>,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    #[must_use]
    pub fn new(run_id: impl Into<String>, user_handle: impl Into<String>, seat_order: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            user_handle: user_handle.into(),
            seat_order,
            ready: false,
            persona: None,
            joined_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_persona(mut self, persona: PersonaSnapshot) -> Self {
        self.persona = Some(persona);
        self
    }

    #[must_use]
    pub fn ready(mut self) -> Self {
        self.ready = true;
        self
    }

    /// Usable claim set: cleaned snapshot points padded to exactly three.
    ///
    /// A missing snapshot yields the fixed default triple; short sets are
    /// padded with [`PADDING_POINT`] and long sets truncated at three.
    #[must_use]
    pub fn claim_points(&self) -> Vec<String> {
        let Some(persona) = &self.persona else {
            return DEFAULT_DEFEND_POINTS.iter().map(|p| (*p).to_string()).collect();
        };
        let mut cleaned: Vec<String> = persona
            .defend_points
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        while cleaned.len() < 3 {
            cleaned.push(PADDING_POINT.to_string());
        }
        cleaned.truncate(3);
        cleaned
    }

    /// Stance line for prompting; defaults when the snapshot is absent/blank.
    #[must_use]
    pub fn stance(&self) -> String {
        match &self.persona {
            Some(persona) if !persona.stance.trim().is_empty() => persona.stance.clone(),
            _ => DEFAULT_STANCE.to_string(),
        }
    }
}

/// Per-turn heuristics recorded alongside the content.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TurnMetrics {
    pub similarity_to_previous: f64,
    pub is_new_claim: bool,
    pub was_flagged: bool,
}

/// One participant's single contribution at a fixed schedule position.
///
/// Immutable once persisted; `(run_id, turn_index)` is unique per run and
/// indices are 1-based and strictly increasing.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub run_id: String,
    pub turn_index: u32,
    pub speaker_participant_id: String,
    pub phase: Phase,
    pub content: String,
    pub metrics: TurnMetrics,
    pub model_metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        turn_index: u32,
        speaker_participant_id: impl Into<String>,
        phase: Phase,
        content: impl Into<String>,
        metrics: TurnMetrics,
        model_metadata: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            turn_index,
            speaker_participant_id: speaker_participant_id.into(),
            phase,
            content: content.into(),
            metrics,
            model_metadata,
            created_at: Utc::now(),
        }
    }
}

/// A heuristic, rate-limited recognition attached to one turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BadgeAward {
    pub id: String,
    pub run_id: String,
    pub turn_id: String,
    pub turn_index: u32,
    pub badge_key: String,
    pub reason: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl BadgeAward {
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        turn_id: impl Into<String>,
        turn_index: u32,
        badge_key: impl Into<String>,
        reason: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            turn_id: turn_id.into(),
            turn_index,
            badge_key: badge_key.into(),
            reason: reason.into(),
            confidence,
            created_at: Utc::now(),
        }
    }
}

/// Post-run summary; exactly one per run, replaced on recomputation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub run_id: String,
    pub summary: String,
    pub wrapped: crate::report::WrappedReport,
    pub created_at: DateTime<Utc>,
}

impl Report {
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        summary: impl Into<String>,
        wrapped: crate::report::WrappedReport,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            summary: summary.into(),
            wrapped,
            created_at: Utc::now(),
        }
    }
}
