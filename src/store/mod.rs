//! Persistence collaborator contract and backends.
//!
//! The runtime only ever talks to [`RunStore`]; the in-memory backend covers
//! tests and development, and the SQLite backend (behind the `sqlite`
//! feature) provides durable storage. Both enforce the same invariants:
//! unique `(run_id, turn_index)` per turn, strictly increasing event ids per
//! run, and a single report per run.

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::event_bus::{EventKind, WireEvent};
use crate::model::{BadgeAward, Participant, Report, Run, Turn};

pub use memory::InMemoryRunStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRunStore;

/// Errors surfaced by a store backend.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("{what} not found: {id}")]
    #[diagnostic(code(quarrel::store::not_found))]
    NotFound { what: &'static str, id: String },

    #[error("constraint violated: {message}")]
    #[diagnostic(
        code(quarrel::store::conflict),
        help("Turn indices and reports are unique per run; re-check the caller's bookkeeping.")
    )]
    Conflict { message: String },

    #[error("backend error: {message}")]
    #[diagnostic(code(quarrel::store::backend))]
    Backend { message: String },

    #[error("serialization failed: {source}")]
    #[diagnostic(code(quarrel::store::serde))]
    Serde {
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence contract consumed by the runtime.
///
/// `append_event` is the one write with internal sequencing: the store
/// assigns the next per-run event id and returns the finished wire event so
/// the caller can publish exactly what was persisted.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &Run) -> Result<()>;

    async fn fetch_run(&self, run_id: &str) -> Result<Option<Run>>;

    async fn update_run(&self, run: &Run) -> Result<()>;

    async fn add_participant(&self, participant: &Participant) -> Result<()>;

    /// Ready participants for a run, ordered by seat.
    async fn ready_participants(&self, run_id: &str) -> Result<Vec<Participant>>;

    async fn insert_turn(&self, turn: &Turn) -> Result<()>;

    /// All turns for a run in turn-index order.
    async fn list_turns(&self, run_id: &str) -> Result<Vec<Turn>>;

    async fn append_event(
        &self,
        run_id: &str,
        kind: EventKind,
        turn_index: Option<u32>,
        payload: Value,
    ) -> Result<WireEvent>;

    /// All events for a run in id order.
    async fn list_events(&self, run_id: &str) -> Result<Vec<WireEvent>>;

    async fn insert_badge(&self, award: &BadgeAward) -> Result<()>;

    /// All badge awards for a run in creation order.
    async fn list_badges(&self, run_id: &str) -> Result<Vec<BadgeAward>>;

    /// Replace (never duplicate) the run's report.
    async fn upsert_report(&self, report: &Report) -> Result<()>;

    async fn fetch_report(&self, run_id: &str) -> Result<Option<Report>>;
}
