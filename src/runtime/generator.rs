//! Turn content generation: the collaborator trait and the deterministic
//! template fallback.
//!
//! Generation can never abort a run. The orchestrator calls whatever
//! [`TurnGenerator`] it was composed with and substitutes
//! [`template_turn_text`] whenever the generator errors or returns blank
//! output, so a provider outage degrades to scripted turns instead of a
//! failed run.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::types::{EvidenceMode, Phase, WinCondition};

/// Closer appended to a turn once the speaker has nothing new left.
pub const DONE_LINE: &str = "I have nothing meaningfully new after this turn.";

/// Error surfaced by a turn generation provider.
#[derive(Debug, Error, Diagnostic)]
pub enum GeneratorError {
    #[error("provider {provider} failed: {message}")]
    #[diagnostic(
        code(quarrel::runtime::generator::provider),
        help("The run continues with the deterministic template fallback.")
    )]
    Provider { provider: String, message: String },
}

impl GeneratorError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Everything a generator may condition one turn's text on.
#[derive(Clone, Copy, Debug)]
pub struct TurnPrompt<'a> {
    pub speaker_handle: &'a str,
    pub stance: &'a str,
    pub chosen_point: &'a str,
    pub opponent_last_turn: Option<&'a str>,
    pub win_condition: WinCondition,
    pub phase: Phase,
    pub evidence_mode: EvidenceMode,
    pub turn_index: u32,
    pub max_turns: u32,
    pub done_hint: bool,
}

/// Pluggable content provider for one turn.
#[async_trait]
pub trait TurnGenerator: Send + Sync {
    async fn generate(&self, prompt: &TurnPrompt<'_>) -> Result<String, GeneratorError>;

    /// Provider name recorded in turn metadata.
    fn name(&self) -> &str {
        "template"
    }
}

/// Deterministic scripted turn text.
///
/// Every section is a fixed lookup on the prompt, so the output is stable
/// for a given prompt and never empty.
#[must_use]
pub fn template_turn_text(prompt: &TurnPrompt<'_>) -> String {
    let phase_prefix = match prompt.phase {
        Phase::Opening => "Opening salvo",
        Phase::Escalation => "Pressure phase",
        Phase::Resolution => "Closing move",
    };

    let opponent_line = if prompt.opponent_last_turn.is_some() {
        "You made one fair point, but it still misses the core issue."
    } else {
        "Setting the frame before this gets chaotic."
    };

    let win_line = match prompt.win_condition {
        WinCondition::BeRight => "Goal: expose the flaw, not just talk louder.",
        WinCondition::FindOverlap => "Goal: lock one concrete overlap before this ends.",
        WinCondition::ExposeWeakPoints => "Goal: test weak links and keep receipts.",
        WinCondition::UnderstandOtherSide => "Goal: translate their logic before countering.",
    };

    let evidence_line = match prompt.evidence_mode {
        EvidenceMode::ReceiptsPreferred => "I am anchoring this on a concrete claim and outcome signal.",
        EvidenceMode::Freeform => "I am focusing on argument logic over citation format.",
    };

    let end_line = if prompt.done_hint { DONE_LINE } else { "" };

    format!(
        "[{phase_prefix}] {handle}: {opponent_line} My stance is {stance}. \
         Core point: {point}. {win_line} {evidence_line} Turn {turn}/{max}. {end_line}",
        handle = prompt.speaker_handle,
        stance = prompt.stance,
        point = prompt.chosen_point,
        turn = prompt.turn_index,
        max = prompt.max_turns,
    )
    .trim()
    .to_string()
}

/// [`TurnGenerator`] that always answers with [`template_turn_text`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateGenerator;

#[async_trait]
impl TurnGenerator for TemplateGenerator {
    async fn generate(&self, prompt: &TurnPrompt<'_>) -> Result<String, GeneratorError> {
        Ok(template_turn_text(prompt))
    }
}
