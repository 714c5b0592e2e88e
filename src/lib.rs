//! # Quarrel: Bounded Multi-Party Debate Runtime
//!
//! Quarrel runs structured, turn-based debates end to end: it schedules who
//! speaks at each slot, generates and moderates every turn, streams content
//! token by token to observers, detects natural completion or stagnation,
//! awards rule-based badges, and builds a post-run "wrapped" report.
//!
//! ## Core Concepts
//!
//! - **Run**: one bounded debate under a topic, shape, and control set
//! - **Schedule**: the full speaking order, computed before the first turn
//! - **Turns**: immutable, strictly ordered contributions with per-turn metrics
//! - **Events**: an append-only per-run log that doubles as the live stream
//! - **Collaborators**: persistence, generation, and durable transport stay
//!   behind traits so the embedding service supplies its own
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quarrel::model::{Participant, Run};
//! use quarrel::runtime::DebateRuntime;
//! use quarrel::types::{DebateShape, RunControls};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = DebateRuntime::in_memory();
//!
//! let mut run = Run::new(
//!     "Is a hot dog a sandwich?",
//!     DebateShape::QuickSkirmish,
//!     RunControls::default(),
//! );
//! run.claim();
//! runtime.store().create_run(&run).await?;
//! runtime
//!     .store()
//!     .add_participant(&Participant::new(&run.id, "ada", 0).ready())
//!     .await?;
//! runtime
//!     .store()
//!     .add_participant(&Participant::new(&run.id, "lin", 1).ready())
//!     .await?;
//!
//! // Watch the live stream from another task.
//! let _subscription = runtime.bus().subscribe(&run.id).await;
//!
//! let outcome = runtime.run_to_completion(&run.id).await?;
//! println!("debate ended after {} turns", outcome.turn_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Map
//!
//! - [`schedule`]: round-robin speaking order plus pluggable strategies
//! - [`engine`]: phase classification and turn similarity
//! - [`moderation`]: the pre-persistence text guardrail
//! - [`detector`]: claim tracking, stagnation, and the stop condition
//! - [`badges`]: the fixed-priority award rule table
//! - [`event_bus`]: durable-preferred pub/sub with late-joiner replay
//! - [`store`]: the persistence contract and its backends
//! - [`runtime`]: the orchestrator and the [`runtime::DebateRuntime`]
//!   composition root
//! - [`report`]: the post-run wrapped summary

pub mod badges;
pub mod detector;
pub mod engine;
pub mod event_bus;
pub mod model;
pub mod moderation;
pub mod report;
pub mod runtime;
pub mod schedule;
pub mod store;
pub mod types;
