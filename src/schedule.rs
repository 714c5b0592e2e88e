//! Turn scheduling: who speaks at each of the run's `max_turns` slots.
//!
//! The default policy is pure round-robin and is computed once, in full,
//! before the first turn executes so the orchestrator can validate its
//! preconditions before committing resources. Richer strategies plug in
//! through [`ScheduleStrategy`], but the round-robin fallback is mandatory:
//! any strategy error or malformed plan is discarded in its favor, so the
//! orchestrator only ever depends on the fallback's contract.

use miette::Diagnostic;
use thiserror::Error;

/// Error surfaced by a pluggable scheduling strategy.
#[derive(Debug, Error, Diagnostic)]
pub enum ScheduleError {
    #[error("schedule strategy failed: {message}")]
    #[diagnostic(
        code(quarrel::schedule::strategy),
        help("The round-robin fallback will be used instead.")
    )]
    Strategy { message: String },
}

impl ScheduleError {
    pub fn strategy(message: impl Into<String>) -> Self {
        Self::Strategy {
            message: message.into(),
        }
    }
}

/// Canonical round-robin plan: `schedule[i] = i % participant_count`.
///
/// Empty when `participant_count < 1`; otherwise the plan has exactly
/// `max_turns` entries, each in `[0, participant_count)`.
#[must_use]
pub fn round_robin(participant_count: usize, max_turns: usize) -> Vec<usize> {
    if participant_count < 1 {
        return Vec::new();
    }
    (0..max_turns).map(|i| i % participant_count).collect()
}

/// A pluggable speaking-order policy.
///
/// Implementations may fail or produce garbage; [`TurnScheduler::plan`]
/// validates the output and silently substitutes round-robin when it is
/// unusable. Strategies for round-robin topologies must agree with
/// [`round_robin`] exactly.
pub trait ScheduleStrategy: Send + Sync {
    fn plan(&self, participant_count: usize, max_turns: usize) -> Result<Vec<usize>, ScheduleError>;
}

/// Scheduler facade owned by the orchestrator.
#[derive(Default)]
pub struct TurnScheduler {
    primary: Option<Box<dyn ScheduleStrategy>>,
}

impl TurnScheduler {
    /// Round-robin only; no primary strategy.
    #[must_use]
    pub fn round_robin() -> Self {
        Self { primary: None }
    }

    /// Prefer `strategy`, falling back to round-robin on error or bad output.
    #[must_use]
    pub fn with_strategy(strategy: Box<dyn ScheduleStrategy>) -> Self {
        Self {
            primary: Some(strategy),
        }
    }

    /// Produce the full speaking order for a run.
    ///
    /// Never fails: a primary strategy's error or invalid plan is logged and
    /// replaced by the round-robin fallback unconditionally.
    #[must_use]
    pub fn plan(&self, participant_count: usize, max_turns: usize) -> Vec<usize> {
        if let Some(primary) = &self.primary {
            match primary.plan(participant_count, max_turns) {
                Ok(plan) if plan_is_valid(&plan, participant_count, max_turns) => return plan,
                Ok(plan) => {
                    tracing::warn!(
                        plan_len = plan.len(),
                        participant_count,
                        max_turns,
                        "schedule strategy produced an invalid plan; using round-robin"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        participant_count,
                        max_turns,
                        "schedule strategy failed; using round-robin"
                    );
                }
            }
        }
        round_robin(participant_count, max_turns)
    }
}

fn plan_is_valid(plan: &[usize], participant_count: usize, max_turns: usize) -> bool {
    if participant_count < 1 {
        return plan.is_empty();
    }
    plan.len() == max_turns && plan.iter().all(|seat| *seat < participant_count)
}

#[cfg(feature = "graph-scheduler")]
pub use graph::GraphStrategy;

/// Graph-walk strategy over a participant ring, behind `graph-scheduler`.
#[cfg(feature = "graph-scheduler")]
pub mod graph {
    use petgraph::graph::{DiGraph, NodeIndex};

    use super::{ScheduleError, ScheduleStrategy};

    /// Plans by walking a directed ring of participant nodes.
    ///
    /// Equivalent to round-robin by construction; exists so richer
    /// topologies can be modeled later without touching the orchestrator.
    #[derive(Debug, Default)]
    pub struct GraphStrategy;

    impl ScheduleStrategy for GraphStrategy {
        fn plan(
            &self,
            participant_count: usize,
            max_turns: usize,
        ) -> Result<Vec<usize>, ScheduleError> {
            if participant_count < 1 {
                return Ok(Vec::new());
            }
            let mut ring: DiGraph<usize, ()> = DiGraph::new();
            let nodes: Vec<NodeIndex> = (0..participant_count).map(|i| ring.add_node(i)).collect();
            for (i, node) in nodes.iter().enumerate() {
                ring.add_edge(*node, nodes[(i + 1) % participant_count], ());
            }

            let mut order = Vec::with_capacity(max_turns);
            let mut cursor = nodes[0];
            for _ in 0..max_turns {
                order.push(ring[cursor]);
                cursor = ring
                    .neighbors(cursor)
                    .next()
                    .ok_or_else(|| ScheduleError::strategy("participant ring is broken"))?;
            }
            Ok(order)
        }
    }
}
