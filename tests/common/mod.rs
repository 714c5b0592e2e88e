//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use quarrel::event_bus::{BrokerError, EventBroker, EventKind, WireEvent};
use quarrel::model::{BadgeAward, Participant, PersonaSnapshot, Report, Run, Turn};
use quarrel::runtime::{GeneratorError, TurnGenerator, TurnPrompt};
use quarrel::store::{RunStore, StoreError};
use quarrel::types::{DebateShape, RunControls, PaceMode};

pub fn persona(stance: &str, points: &[&str]) -> PersonaSnapshot {
    PersonaSnapshot {
        stance: stance.to_string(),
        defend_points: points.iter().map(|p| (*p).to_string()).collect(),
        red_lines: Vec::new(),
    }
}

pub fn fast_controls() -> RunControls {
    RunControls {
        pace_mode: PaceMode::Fast,
        ..RunControls::default()
    }
}

/// A claimed run with two ready, persona-backed participants.
pub async fn seed_run(
    store: &dyn RunStore,
    shape: DebateShape,
    controls: RunControls,
) -> (Run, Vec<Participant>) {
    let mut run = Run::new("cats make better roommates than dogs", shape, controls);
    run.claim();
    store.create_run(&run).await.expect("create run");

    let ada = Participant::new(&run.id, "ada", 0)
        .with_persona(persona(
            "cats are the superior roommate",
            &["cats are quiet", "cats are clean", "cats are cheap"],
        ))
        .ready();
    let lin = Participant::new(&run.id, "lin", 1)
        .with_persona(persona(
            "dogs earn their keep",
            &["dogs guard the house", "dogs force you outside", "dogs are loyal"],
        ))
        .ready();
    store.add_participant(&ada).await.expect("add ada");
    store.add_participant(&lin).await.expect("add lin");
    (run, vec![ada, lin])
}

pub fn make_turn(run_id: &str, turn_index: u32, speaker: &str, content: &str) -> Turn {
    Turn::new(
        run_id,
        turn_index,
        speaker,
        quarrel::engine::compute_phase(turn_index, 8),
        content,
        quarrel::model::TurnMetrics::default(),
        serde_json::json!({ "provider": "test" }),
    )
}

pub fn make_badge(run_id: &str, turn_id: &str, turn_index: u32, key: &str) -> BadgeAward {
    BadgeAward::new(run_id, turn_id, turn_index, key, "because", 0.8)
}

/// Broker that refuses every call; drives the in-process fallback paths.
#[derive(Debug, Default)]
pub struct FailingBroker;

#[async_trait]
impl EventBroker for FailingBroker {
    async fn publish(&self, _channel: &str, _payload: &str) -> Result<(), BrokerError> {
        Err(BrokerError::unreachable("test broker is down"))
    }

    async fn subscribe(&self, _channel: &str) -> Result<flume::Receiver<String>, BrokerError> {
        Err(BrokerError::unreachable("test broker is down"))
    }
}

/// Generator that answers every prompt with the same fixed text.
#[derive(Debug)]
pub struct ConstantGenerator(pub &'static str);

#[async_trait]
impl TurnGenerator for ConstantGenerator {
    async fn generate(&self, _prompt: &TurnPrompt<'_>) -> Result<String, GeneratorError> {
        Ok(self.0.to_string())
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Generator that always fails, forcing the template fallback.
#[derive(Debug, Default)]
pub struct BrokenGenerator;

#[async_trait]
impl TurnGenerator for BrokenGenerator {
    async fn generate(&self, _prompt: &TurnPrompt<'_>) -> Result<String, GeneratorError> {
        Err(GeneratorError::provider("broken", "always down"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Store wrapper whose `insert_turn` starts failing after a set number of
/// successes.
pub struct FlakyStore<S> {
    inner: S,
    turns_before_failure: AtomicU32,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S, turns_before_failure: u32) -> Self {
        Self {
            inner,
            turns_before_failure: AtomicU32::new(turns_before_failure),
        }
    }
}

#[async_trait]
impl<S: RunStore> RunStore for FlakyStore<S> {
    async fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        self.inner.create_run(run).await
    }

    async fn fetch_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        self.inner.fetch_run(run_id).await
    }

    async fn update_run(&self, run: &Run) -> Result<(), StoreError> {
        self.inner.update_run(run).await
    }

    async fn add_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        self.inner.add_participant(participant).await
    }

    async fn ready_participants(&self, run_id: &str) -> Result<Vec<Participant>, StoreError> {
        self.inner.ready_participants(run_id).await
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<(), StoreError> {
        let remaining = self.turns_before_failure.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(StoreError::backend("disk is gone"));
        }
        self.turns_before_failure.store(remaining - 1, Ordering::SeqCst);
        self.inner.insert_turn(turn).await
    }

    async fn list_turns(&self, run_id: &str) -> Result<Vec<Turn>, StoreError> {
        self.inner.list_turns(run_id).await
    }

    async fn append_event(
        &self,
        run_id: &str,
        kind: EventKind,
        turn_index: Option<u32>,
        payload: Value,
    ) -> Result<WireEvent, StoreError> {
        self.inner.append_event(run_id, kind, turn_index, payload).await
    }

    async fn list_events(&self, run_id: &str) -> Result<Vec<WireEvent>, StoreError> {
        self.inner.list_events(run_id).await
    }

    async fn insert_badge(&self, award: &BadgeAward) -> Result<(), StoreError> {
        self.inner.insert_badge(award).await
    }

    async fn list_badges(&self, run_id: &str) -> Result<Vec<BadgeAward>, StoreError> {
        self.inner.list_badges(run_id).await
    }

    async fn upsert_report(&self, report: &Report) -> Result<(), StoreError> {
        self.inner.upsert_report(report).await
    }

    async fn fetch_report(&self, run_id: &str) -> Result<Option<Report>, StoreError> {
        self.inner.fetch_report(run_id).await
    }
}

/// Collect every event currently pending on a subscription without waiting.
pub fn drain_subscription(sub: &quarrel::event_bus::EventSubscription) -> Vec<WireEvent> {
    let mut events = Vec::new();
    while let Some(event) = sub.try_recv() {
        events.push(event);
    }
    events
}

pub fn dyn_store(store: impl RunStore + 'static) -> Arc<dyn RunStore> {
    Arc::new(store)
}
