//! Volatile store backend for tests and development.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::event_bus::{EventKind, WireEvent};
use crate::model::{BadgeAward, Participant, Report, Run, Turn};

use super::{Result, RunStore, StoreError};

#[derive(Default)]
struct Inner {
    runs: FxHashMap<String, Run>,
    participants: FxHashMap<String, Vec<Participant>>,
    turns: FxHashMap<String, Vec<Turn>>,
    events: FxHashMap<String, Vec<WireEvent>>,
    badges: FxHashMap<String, Vec<BadgeAward>>,
    reports: FxHashMap<String, Report>,
}

/// In-memory [`RunStore`] with the same invariants as the durable backend.
#[derive(Default)]
pub struct InMemoryRunStore {
    inner: Mutex<Inner>,
}

impl InMemoryRunStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create_run(&self, run: &Run) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if inner.runs.contains_key(&run.id) {
            return Err(StoreError::conflict(format!("run {} already exists", run.id)));
        }
        inner.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn fetch_run(&self, run_id: &str) -> Result<Option<Run>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.runs.get(run_id).cloned())
    }

    async fn update_run(&self, run: &Run) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if !inner.runs.contains_key(&run.id) {
            return Err(StoreError::NotFound {
                what: "run",
                id: run.id.clone(),
            });
        }
        inner.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn add_participant(&self, participant: &Participant) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .participants
            .entry(participant.run_id.clone())
            .or_default()
            .push(participant.clone());
        Ok(())
    }

    async fn ready_participants(&self, run_id: &str) -> Result<Vec<Participant>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut seated: Vec<Participant> = inner
            .participants
            .get(run_id)
            .map(|all| all.iter().filter(|p| p.ready).cloned().collect())
            .unwrap_or_default();
        seated.sort_by_key(|p| p.seat_order);
        Ok(seated)
    }

    async fn insert_turn(&self, turn: &Turn) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let turns = inner.turns.entry(turn.run_id.clone()).or_default();
        if turns.iter().any(|t| t.turn_index == turn.turn_index) {
            return Err(StoreError::conflict(format!(
                "turn {} already recorded for run {}",
                turn.turn_index, turn.run_id
            )));
        }
        turns.push(turn.clone());
        Ok(())
    }

    async fn list_turns(&self, run_id: &str) -> Result<Vec<Turn>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut turns = inner.turns.get(run_id).cloned().unwrap_or_default();
        turns.sort_by_key(|t| t.turn_index);
        Ok(turns)
    }

    async fn append_event(
        &self,
        run_id: &str,
        kind: EventKind,
        turn_index: Option<u32>,
        payload: Value,
    ) -> Result<WireEvent> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let events = inner.events.entry(run_id.to_string()).or_default();
        let id = events.last().map_or(1, |e| e.id + 1);
        let event = WireEvent {
            id,
            run_id: run_id.to_string(),
            kind,
            turn_index,
            payload,
            created_at: Utc::now(),
        };
        events.push(event.clone());
        Ok(event)
    }

    async fn list_events(&self, run_id: &str) -> Result<Vec<WireEvent>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.events.get(run_id).cloned().unwrap_or_default())
    }

    async fn insert_badge(&self, award: &BadgeAward) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner
            .badges
            .entry(award.run_id.clone())
            .or_default()
            .push(award.clone());
        Ok(())
    }

    async fn list_badges(&self, run_id: &str) -> Result<Vec<BadgeAward>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.badges.get(run_id).cloned().unwrap_or_default())
    }

    async fn upsert_report(&self, report: &Report) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        inner.reports.insert(report.run_id.clone(), report.clone());
        Ok(())
    }

    async fn fetch_report(&self, run_id: &str) -> Result<Option<Report>> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.reports.get(run_id).cloned())
    }
}
