//! The per-run execution loop.
//!
//! An [`Orchestrator`] drives exactly one run at a time from its claimed
//! `Running` state to `Completed` or `Failed`: validate preconditions, then
//! for each scheduled slot classify the phase, select a claim, generate and
//! moderate content, stream it token by token, persist the turn, evaluate
//! badges, and check the stop condition. Every event is appended to the
//! store before it is published, which is what makes late-joiner replay
//! consistent.
//!
//! Failure policy: store failures are fatal; generator failures fall back to
//! the scripted template; bus failures are absorbed by the bus itself.

use std::sync::Arc;

use chrono::Utc;
use miette::Diagnostic;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::badges::{BadgeContext, BadgeLedger};
use crate::detector::{ClaimTracker, StagnationTracker};
use crate::engine::{compute_phase, cosine_similarity};
use crate::event_bus::{EventBus, EventKind};
use crate::model::{BadgeAward, Participant, Report, Run, Turn, TurnMetrics};
use crate::moderation::moderate;
use crate::report::build_wrapped_report;
use crate::schedule::TurnScheduler;
use crate::store::{RunStore, StoreError};
use crate::types::RunStatus;

use super::generator::{TurnGenerator, TurnPrompt, template_turn_text};

/// Why a run stopped producing turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Every scheduled slot was used.
    ScheduleExhausted,
    /// The stagnation/completion detector fired before the schedule ran out.
    NaturalStop,
}

impl StopReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::ScheduleExhausted => "schedule_exhausted",
            StopReason::NaturalStop => "natural_stop",
        }
    }
}

/// Summary of one completed run.
#[derive(Clone, Copy, Debug)]
pub struct RunOutcome {
    pub turn_count: u32,
    pub stopped_early: bool,
    pub reason: StopReason,
}

/// Fatal runtime errors; each one leaves the run marked `Failed` (when the
/// run row exists) with a single `error` event appended.
#[derive(Debug, Error, Diagnostic)]
pub enum RuntimeError {
    #[error("run not found: {run_id}")]
    #[diagnostic(code(quarrel::runtime::run_not_found))]
    RunNotFound { run_id: String },

    #[error("run {run_id} is {status}, expected running")]
    #[diagnostic(
        code(quarrel::runtime::not_claimed),
        help("Claim the run (status -> running) before handing it to the orchestrator.")
    )]
    NotClaimed { run_id: String, status: RunStatus },

    #[error("run {run_id} has {ready} ready participants, need at least 2")]
    #[diagnostic(code(quarrel::runtime::not_enough_participants))]
    NotEnoughParticipants { run_id: String, ready: usize },

    #[error("run {run_id} produced an empty schedule")]
    #[diagnostic(code(quarrel::runtime::empty_schedule))]
    EmptySchedule { run_id: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

/// Drives runs end to end against the composed collaborators.
pub struct Orchestrator {
    store: Arc<dyn RunStore>,
    bus: Arc<EventBus>,
    generator: Arc<dyn TurnGenerator>,
    scheduler: TurnScheduler,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        store: Arc<dyn RunStore>,
        bus: Arc<EventBus>,
        generator: Arc<dyn TurnGenerator>,
        scheduler: TurnScheduler,
    ) -> Self {
        Self {
            store,
            bus,
            generator,
            scheduler,
        }
    }

    /// Append an event to the run's log and fan it out.
    ///
    /// The append is the authoritative write; publishing is best-effort and
    /// cannot fail the caller.
    async fn emit(
        &self,
        run_id: &str,
        kind: EventKind,
        turn_index: Option<u32>,
        payload: Value,
    ) -> Result<(), StoreError> {
        let event = self.store.append_event(run_id, kind, turn_index, payload).await?;
        self.bus.publish(&event).await;
        Ok(())
    }

    /// Mark the run failed and append one `error` event, best-effort.
    async fn fail_run(&self, run: &mut Run, message: &str) {
        run.status = RunStatus::Failed;
        run.ended_at = Some(Utc::now());
        if let Err(err) = self.store.update_run(run).await {
            warn!(run_id = %run.id, error = %err, "could not persist failed status");
        }
        if let Err(err) = self
            .emit(&run.id, EventKind::Error, None, json!({ "message": message }))
            .await
        {
            warn!(run_id = %run.id, error = %err, "could not append error event");
        }
    }

    /// Execute one claimed run to completion.
    #[instrument(skip(self), err)]
    pub async fn run(&self, run_id: &str) -> Result<RunOutcome, RuntimeError> {
        let mut run = self
            .store
            .fetch_run(run_id)
            .await?
            .ok_or_else(|| RuntimeError::RunNotFound {
                run_id: run_id.to_string(),
            })?;

        if run.status != RunStatus::Running {
            let status = run.status;
            self.fail_run(&mut run, "Run was not claimed before execution").await;
            return Err(RuntimeError::NotClaimed {
                run_id: run_id.to_string(),
                status,
            });
        }

        let participants = self.store.ready_participants(run_id).await?;
        if participants.len() < 2 {
            self.fail_run(&mut run, "Not enough ready participants").await;
            return Err(RuntimeError::NotEnoughParticipants {
                run_id: run_id.to_string(),
                ready: participants.len(),
            });
        }

        let schedule = self.scheduler.plan(participants.len(), run.max_turns as usize);
        if schedule.is_empty() {
            self.fail_run(&mut run, "Turn schedule is empty").await;
            return Err(RuntimeError::EmptySchedule {
                run_id: run_id.to_string(),
            });
        }

        match self.drive(&mut run, &participants, &schedule).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.fail_run(&mut run, "Run persistence failed").await;
                Err(err.into())
            }
        }
    }

    /// Turn loop plus finalization; any store error aborts the run.
    async fn drive(
        &self,
        run: &mut Run,
        participants: &[Participant],
        schedule: &[usize],
    ) -> Result<RunOutcome, StoreError> {
        let run_id = run.id.clone();
        let composure = run.controls.composure;
        let evidence_mode = run.controls.evidence_mode;
        let win_condition = run.controls.win_condition;
        let token_delay = run.controls.pace_mode.token_delay();
        let max_turns = run.max_turns;

        let mut claims = ClaimTracker::new();
        let mut stagnation = StagnationTracker::new();
        let mut ledger = BadgeLedger::new();
        let mut previous_turn_text: Option<String> = None;
        let mut reason = StopReason::ScheduleExhausted;

        self.emit(
            &run_id,
            EventKind::PhaseChanged,
            None,
            json!({ "phase": run.phase.as_str() }),
        )
        .await?;

        for (slot, seat_idx) in schedule.iter().enumerate() {
            let turn_index = slot as u32 + 1;
            let speaker = &participants[*seat_idx];
            let phase = compute_phase(turn_index, max_turns);
            if run.phase != phase {
                run.phase = phase;
                self.store.update_run(run).await?;
                self.emit(
                    &run_id,
                    EventKind::PhaseChanged,
                    Some(turn_index),
                    json!({ "phase": phase.as_str() }),
                )
                .await?;
            }

            let points = speaker.claim_points();
            let stance = speaker.stance();
            let selection = claims.select(
                &speaker.id,
                speaker.seat_order,
                turn_index,
                max_turns,
                points.len(),
            );

            let prompt = TurnPrompt {
                speaker_handle: &speaker.user_handle,
                stance: &stance,
                chosen_point: &points[selection.index],
                opponent_last_turn: previous_turn_text.as_deref(),
                win_condition,
                phase,
                evidence_mode,
                turn_index,
                max_turns,
                done_hint: selection.done_hint,
            };
            let generated = match self.generator.generate(&prompt).await {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => {
                    debug!(run_id = %run_id, turn_index, "generator returned blank output; using template");
                    template_turn_text(&prompt)
                }
                Err(err) => {
                    warn!(run_id = %run_id, turn_index, error = %err, "generator failed; using template");
                    template_turn_text(&prompt)
                }
            };
            let (moderated, was_flagged) = moderate(&generated);

            self.emit(
                &run_id,
                EventKind::TurnMeta,
                Some(turn_index),
                json!({ "speaker_participant_id": speaker.id, "state": "thinking" }),
            )
            .await?;

            let tokens: Vec<&str> = moderated.split_whitespace().collect();
            for token in &tokens {
                self.emit(
                    &run_id,
                    EventKind::TurnToken,
                    Some(turn_index),
                    json!({
                        "speaker_participant_id": speaker.id,
                        "token": format!("{token} "),
                    }),
                )
                .await?;
                tokio::time::sleep(token_delay).await;
            }
            let final_text = tokens.join(" ");

            let similarity =
                cosine_similarity(previous_turn_text.as_deref().unwrap_or(""), &final_text);
            stagnation.observe(&speaker.id, similarity, selection.is_new, selection.done_hint);

            let turn = Turn::new(
                &run_id,
                turn_index,
                &speaker.id,
                phase,
                final_text.clone(),
                TurnMetrics {
                    similarity_to_previous: similarity,
                    is_new_claim: selection.is_new,
                    was_flagged,
                },
                json!({ "provider": self.generator.name() }),
            );
            self.store.insert_turn(&turn).await?;

            run.turn_count = turn_index;
            self.store.update_run(run).await?;

            self.emit(
                &run_id,
                EventKind::TurnFinal,
                Some(turn_index),
                json!({
                    "turn_id": turn.id,
                    "speaker_participant_id": speaker.id,
                    "content": final_text,
                    "phase": phase.as_str(),
                }),
            )
            .await?;

            let badge_ctx = BadgeContext {
                turn_text: &final_text,
                previous_turn_text: previous_turn_text.as_deref(),
                evidence_mode,
                composure,
                turn_index,
            };
            if let Some(decision) = ledger.evaluate(&badge_ctx) {
                let award = BadgeAward::new(
                    &run_id,
                    &turn.id,
                    turn_index,
                    decision.badge_key,
                    decision.reason,
                    decision.confidence,
                );
                self.store.insert_badge(&award).await?;
                self.emit(
                    &run_id,
                    EventKind::BadgeAwarded,
                    Some(turn_index),
                    json!({
                        "turn_id": turn.id,
                        "turn_index": turn_index,
                        "badge_key": decision.badge_key,
                        "reason": decision.reason,
                        "confidence": decision.confidence,
                    }),
                )
                .await?;
            }

            previous_turn_text = Some(final_text);

            if stagnation.should_stop(participants.iter().map(|p| p.id.as_str())) {
                reason = StopReason::NaturalStop;
                break;
            }
        }

        run.status = RunStatus::Completed;
        run.ended_at = Some(Utc::now());
        self.store.update_run(run).await?;
        self.emit(
            &run_id,
            EventKind::RunCompleted,
            Some(run.turn_count),
            json!({ "turn_count": run.turn_count, "reason": reason.as_str() }),
        )
        .await?;

        Ok(RunOutcome {
            turn_count: run.turn_count,
            stopped_early: reason == StopReason::NaturalStop,
            reason,
        })
    }

    /// Build (or rebuild) the run's wrapped report.
    ///
    /// Idempotent: recomputation replaces the stored report and re-announces
    /// it, never duplicates it.
    #[instrument(skip(self), err)]
    pub async fn postprocess(&self, run_id: &str) -> Result<Report, RuntimeError> {
        let run = self
            .store
            .fetch_run(run_id)
            .await?
            .ok_or_else(|| RuntimeError::RunNotFound {
                run_id: run_id.to_string(),
            })?;

        let turns = self.store.list_turns(run_id).await?;
        let badges = self.store.list_badges(run_id).await?;
        let (summary, wrapped) = build_wrapped_report(&run.topic, &turns, &badges);
        let report = Report::new(run_id, summary, wrapped);
        self.store.upsert_report(&report).await?;

        self.emit(
            run_id,
            EventKind::TurnMeta,
            Some(run.turn_count),
            json!({ "state": "report_ready" }),
        )
        .await?;

        Ok(report)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("generator", &self.generator.name())
            .finish()
    }
}
