//! Late-joiner replay: persisted history first, then live delivery.
//!
//! The consistency seam works because event ids are strictly increasing per
//! run and the runtime persists every event before publishing it. The tail
//! attaches its live subscription before reading history, then suppresses
//! any live event whose id falls inside the history it already delivered.
//! The observable order is therefore: complete history in id order, then
//! live events, with no gap and no duplicate at the boundary.

use std::collections::VecDeque;

use crate::store::{RunStore, StoreError};

use super::bus::{EventBus, EventSubscription};
use super::event::WireEvent;

/// History-then-live view of one run's event sequence.
pub struct RunTail {
    history: VecDeque<WireEvent>,
    live: EventSubscription,
    /// Highest event id already covered by the history read.
    replayed_through: i64,
}

impl RunTail {
    /// Next event in the seam-consistent order; `None` once the live side
    /// has closed and history is drained.
    pub async fn next(&mut self) -> Option<WireEvent> {
        if let Some(event) = self.history.pop_front() {
            return Some(event);
        }
        loop {
            let event = self.live.recv().await?;
            if event.id > self.replayed_through {
                return Some(event);
            }
            // Already delivered during replay; drop the duplicate.
        }
    }

    /// Drain whatever is immediately available without waiting.
    pub fn drain_ready(&mut self) -> Vec<WireEvent> {
        let mut ready: Vec<WireEvent> = self.history.drain(..).collect();
        while let Some(event) = self.live.try_recv() {
            if event.id > self.replayed_through {
                ready.push(event);
            }
        }
        ready
    }
}

/// Attach a late-joining observer to a run.
///
/// Reads the persisted event log through `store` and stitches it to a live
/// subscription on `bus`. Store failures surface to the caller; a run with
/// no events yet yields an empty history and a purely live tail.
pub async fn tail_run(
    store: &dyn RunStore,
    bus: &EventBus,
    run_id: &str,
) -> Result<RunTail, StoreError> {
    let live = bus.subscribe(run_id).await;
    let history = store.list_events(run_id).await?;
    let replayed_through = history.last().map_or(0, |event| event.id);
    Ok(RunTail {
        history: history.into(),
        live,
        replayed_through,
    })
}
