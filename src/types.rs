//! Core enums for the quarrel debate runtime.
//!
//! These are the domain concepts shared by every component: run lifecycle
//! status, the coarse debate phase, and the control knobs a run is created
//! with (pace, evidence expectations, win condition, debate shape).
//!
//! All enums carry stable string encodings used both on the wire and in
//! persisted rows; decoding falls back to a default variant rather than
//! failing, so values stored by a newer version round-trip safely.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a run.
///
/// A run is created `Waiting`, claimed to `Running` by the caller before the
/// orchestrator is handed the run id, and ends in exactly one of `Completed`
/// or `Failed`. The status claim is the single-ownership mechanism: the
/// orchestrator refuses any run that is not already `Running`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Waiting,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Waiting => "waiting",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Decode a persisted status string; unknown values become `Waiting`.
    pub fn decode(s: &str) -> Self {
        match s {
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Waiting,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse debate phase derived from turn position.
///
/// Ordered and non-reversible: a run's phase only ever moves forward, which
/// the derived `Ord` makes checkable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Opening,
    Escalation,
    Resolution,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::Escalation => "escalation",
            Phase::Resolution => "resolution",
        }
    }

    /// Decode a persisted phase string; unknown values become `Opening`.
    pub fn decode(s: &str) -> Self {
        match s {
            "escalation" => Phase::Escalation,
            "resolution" => Phase::Resolution,
            _ => Phase::Opening,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Streaming pace for per-token delivery delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaceMode {
    Fast,
    #[default]
    Normal,
    Dramatic,
}

impl PaceMode {
    /// Cooperative delay inserted between token events.
    ///
    /// Strictly increasing across `Fast < Normal < Dramatic`.
    #[must_use]
    pub fn token_delay(&self) -> Duration {
        match self {
            PaceMode::Fast => Duration::from_millis(10),
            PaceMode::Normal => Duration::from_millis(30),
            PaceMode::Dramatic => Duration::from_millis(60),
        }
    }

    pub fn decode(s: &str) -> Self {
        match s {
            "FAST" => PaceMode::Fast,
            "DRAMATIC" => PaceMode::Dramatic,
            _ => PaceMode::Normal,
        }
    }
}

/// Whether speakers are expected to anchor claims on concrete receipts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceMode {
    #[default]
    Freeform,
    ReceiptsPreferred,
}

/// What a participant is playing for; only steers generated copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinCondition {
    #[default]
    BeRight,
    FindOverlap,
    ExposeWeakPoints,
    UnderstandOtherSide,
}

/// Preset debate shapes mapping to a turn budget and target token band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebateShape {
    #[default]
    QuickSkirmish,
    ProperThrowdown,
    SlowBurn,
}

/// Turn/token budget backing a [`DebateShape`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShapeConfig {
    pub max_turns: u32,
    pub min_tokens: u32,
    pub max_tokens: u32,
}

impl DebateShape {
    #[must_use]
    pub fn config(&self) -> ShapeConfig {
        match self {
            DebateShape::QuickSkirmish => ShapeConfig {
                max_turns: 8,
                min_tokens: 80,
                max_tokens: 140,
            },
            DebateShape::ProperThrowdown => ShapeConfig {
                max_turns: 14,
                min_tokens: 120,
                max_tokens: 180,
            },
            DebateShape::SlowBurn => ShapeConfig {
                max_turns: 10,
                min_tokens: 180,
                max_tokens: 300,
            },
        }
    }

    /// Decode a shape name; unknown names fall back to `QuickSkirmish`.
    pub fn decode(s: &str) -> Self {
        match s {
            "PROPER_THROWDOWN" => DebateShape::ProperThrowdown,
            "SLOW_BURN" => DebateShape::SlowBurn,
            _ => DebateShape::QuickSkirmish,
        }
    }
}

/// Control knobs fixed at run creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunControls {
    /// 0-100; lower means a spicier, less composed speaker.
    #[serde(default = "default_composure")]
    pub composure: u8,
    #[serde(default)]
    pub pace_mode: PaceMode,
    #[serde(default)]
    pub evidence_mode: EvidenceMode,
    #[serde(default)]
    pub win_condition: WinCondition,
}

fn default_composure() -> u8 {
    45
}

impl Default for RunControls {
    fn default() -> Self {
        Self {
            composure: default_composure(),
            pace_mode: PaceMode::default(),
            evidence_mode: EvidenceMode::default(),
            win_condition: WinCondition::default(),
        }
    }
}
