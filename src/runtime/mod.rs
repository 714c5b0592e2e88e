//! Run execution: the orchestrator, the generation seam, and the
//! composition root that wires collaborators together.
//!
//! [`DebateRuntime`] owns the shared pieces (store, event bus, generator)
//! and hands out [`Orchestrator`]s; each orchestrator executes one run at a
//! time. Runs are isolated tasks, so a service embeds the runtime once and
//! spawns a run per request.
//!
//! ```rust,no_run
//! use quarrel::model::{Participant, Run};
//! use quarrel::runtime::DebateRuntime;
//! use quarrel::types::{DebateShape, RunControls};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = DebateRuntime::in_memory();
//! let mut run = Run::new("tabs vs spaces", DebateShape::QuickSkirmish, RunControls::default());
//! run.claim();
//! runtime.store().create_run(&run).await?;
//! runtime.store().add_participant(&Participant::new(&run.id, "ada", 0).ready()).await?;
//! runtime.store().add_participant(&Participant::new(&run.id, "lin", 1).ready()).await?;
//! let outcome = runtime.run_to_completion(&run.id).await?;
//! println!("finished after {} turns", outcome.turn_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod generator;
pub mod orchestrator;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::event_bus::EventBus;
use crate::schedule::TurnScheduler;
use crate::store::{InMemoryRunStore, RunStore};

pub use config::RuntimeConfig;
pub use generator::{
    DONE_LINE, GeneratorError, TemplateGenerator, TurnGenerator, TurnPrompt, template_turn_text,
};
pub use orchestrator::{Orchestrator, RunOutcome, RuntimeError, StopReason};

/// Composition root owning the collaborators every run shares.
#[derive(Clone)]
pub struct DebateRuntime {
    store: Arc<dyn RunStore>,
    bus: Arc<EventBus>,
    generator: Arc<dyn TurnGenerator>,
}

impl std::fmt::Debug for DebateRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebateRuntime")
            .field("bus", &self.bus)
            .field("generator", &self.generator.name())
            .finish()
    }
}

impl DebateRuntime {
    /// Compose from explicit collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RunStore>,
        bus: Arc<EventBus>,
        generator: Arc<dyn TurnGenerator>,
    ) -> Self {
        Self {
            store,
            bus,
            generator,
        }
    }

    /// Volatile store, in-process bus, template generation. The default test
    /// and development wiring.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryRunStore::new()),
            Arc::new(EventBus::in_process()),
            Arc::new(TemplateGenerator),
        )
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// A fresh orchestrator over the shared collaborators, using round-robin
    /// scheduling.
    #[must_use]
    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(TurnScheduler::round_robin())
    }

    #[must_use]
    pub fn orchestrator_with(&self, scheduler: TurnScheduler) -> Orchestrator {
        Orchestrator::new(
            Arc::clone(&self.store),
            Arc::clone(&self.bus),
            Arc::clone(&self.generator),
            scheduler,
        )
    }

    /// Spawn a run on its own task.
    #[must_use]
    pub fn spawn_run(&self, run_id: impl Into<String>) -> JoinHandle<Result<RunOutcome, RuntimeError>> {
        let orchestrator = self.orchestrator();
        let run_id = run_id.into();
        tokio::spawn(async move { orchestrator.run(&run_id).await })
    }

    /// Execute the run and immediately build its report.
    pub async fn run_to_completion(&self, run_id: &str) -> Result<RunOutcome, RuntimeError> {
        let orchestrator = self.orchestrator();
        let outcome = orchestrator.run(run_id).await?;
        orchestrator.postprocess(run_id).await?;
        Ok(outcome)
    }

    /// Detach all in-process subscribers; part of service shutdown.
    pub fn shutdown(&self) {
        self.bus.close();
    }
}
