//! Event distribution: wire events, the durable broker contract, the
//! durable-or-local bus, and late-joiner replay.

pub mod broker;
pub mod bus;
pub mod event;
pub mod tail;

pub use broker::{BrokerError, EventBroker, run_channel};
pub use bus::{EventBus, EventSubscription};
pub use event::{EventKind, WireEvent};
pub use tail::{RunTail, tail_run};
