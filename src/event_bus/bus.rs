//! The run-scoped event bus: durable broker preferred, in-process fallback.
//!
//! `publish` never fails the caller. When a broker is configured the bus
//! tries it first; the first error on publish or subscribe discards the
//! broker handle and pins the bus to in-process fan-out for every later call
//! until [`EventBus::reconnect`] installs a fresh handle. In-process delivery
//! uses one unbounded flume queue per subscriber keyed by run id, so a slow
//! or detached subscriber can never stall the publisher or its siblings.
//!
//! The bus is a plain value: the composition root constructs it explicitly
//! and owns its lifetime. There is no global instance.

use std::sync::{Arc, Mutex};

use futures_util::stream::{self, Stream};
use rustc_hash::FxHashMap;

use super::broker::{EventBroker, run_channel};
use super::event::WireEvent;

enum Transport {
    Broker(Arc<dyn EventBroker>),
    Local,
}

/// Pub/sub fan-out per run id with at-least-one-path delivery.
pub struct EventBus {
    transport: Mutex<Transport>,
    subscribers: Mutex<FxHashMap<String, Vec<flume::Sender<WireEvent>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::in_process()
    }
}

impl EventBus {
    /// In-process fan-out only; no durable path.
    #[must_use]
    pub fn in_process() -> Self {
        Self {
            transport: Mutex::new(Transport::Local),
            subscribers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Prefer the given durable broker, falling back to in-process delivery
    /// on its first error.
    #[must_use]
    pub fn with_broker(broker: Arc<dyn EventBroker>) -> Self {
        Self {
            transport: Mutex::new(Transport::Broker(broker)),
            subscribers: Mutex::new(FxHashMap::default()),
        }
    }

    /// Install a fresh broker handle after an outage.
    pub fn reconnect(&self, broker: Arc<dyn EventBroker>) {
        let mut transport = self.transport.lock().expect("transport lock poisoned");
        *transport = Transport::Broker(broker);
    }

    fn broker_handle(&self) -> Option<Arc<dyn EventBroker>> {
        let transport = self.transport.lock().expect("transport lock poisoned");
        match &*transport {
            Transport::Broker(broker) => Some(Arc::clone(broker)),
            Transport::Local => None,
        }
    }

    /// Drop the broker handle; all later calls use in-process delivery.
    fn demote(&self, context: &str) {
        let mut transport = self.transport.lock().expect("transport lock poisoned");
        if matches!(&*transport, Transport::Broker(_)) {
            tracing::warn!(context, "event broker failed; falling back to in-process delivery");
            *transport = Transport::Local;
        }
    }

    /// Fan an event out to all current subscribers of its run.
    ///
    /// Best-effort by contract: a broker failure demotes the transport and
    /// the event is delivered locally instead; no error ever reaches the
    /// caller. With zero subscribers the event is simply dropped here (the
    /// persisted log is the durable record).
    pub async fn publish(&self, event: &WireEvent) {
        if let Some(broker) = self.broker_handle() {
            match event.to_json() {
                Ok(payload) => {
                    match broker.publish(&run_channel(&event.run_id), &payload).await {
                        Ok(()) => return,
                        Err(err) => {
                            tracing::debug!(error = %err, run_id = %event.run_id, "broker publish failed");
                            self.demote("publish");
                        }
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, run_id = %event.run_id, "event serialization failed");
                }
            }
        }
        self.fan_out_local(event);
    }

    fn fan_out_local(&self, event: &WireEvent) {
        let mut subscribers = self.subscribers.lock().expect("subscriber lock poisoned");
        if let Some(senders) = subscribers.get_mut(&event.run_id) {
            // Dropped receivers are pruned as they are discovered.
            senders.retain(|tx| tx.send(event.clone()).is_ok());
            if senders.is_empty() {
                subscribers.remove(&event.run_id);
            }
        }
    }

    /// Attach a live subscriber for one run.
    ///
    /// No replay: only events published after attachment are delivered. Use
    /// [`tail_run`](super::tail_run) for history plus live.
    pub async fn subscribe(&self, run_id: &str) -> EventSubscription {
        if let Some(broker) = self.broker_handle() {
            match broker.subscribe(&run_channel(run_id)).await {
                Ok(rx) => {
                    return EventSubscription {
                        inner: SubscriptionInner::Broker(rx),
                    };
                }
                Err(err) => {
                    tracing::debug!(error = %err, run_id, "broker subscribe failed");
                    self.demote("subscribe");
                }
            }
        }

        let (tx, rx) = flume::unbounded();
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .entry(run_id.to_string())
            .or_default()
            .push(tx);
        EventSubscription {
            inner: SubscriptionInner::Local(rx),
        }
    }

    /// Number of live in-process subscribers for a run.
    #[must_use]
    pub fn subscriber_count(&self, run_id: &str) -> usize {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .get(run_id)
            .map_or(0, Vec::len)
    }

    /// End every in-process subscription; tied to service shutdown.
    pub fn close(&self) {
        self.subscribers
            .lock()
            .expect("subscriber lock poisoned")
            .clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let durable = self.broker_handle().is_some();
        f.debug_struct("EventBus").field("durable", &durable).finish()
    }
}

enum SubscriptionInner {
    Local(flume::Receiver<WireEvent>),
    Broker(flume::Receiver<String>),
}

/// An open-ended, ordered sequence of one run's events.
pub struct EventSubscription {
    inner: SubscriptionInner,
}

impl EventSubscription {
    /// Receive the next event; `None` once the feeding side is gone.
    ///
    /// Undecodable broker payloads are skipped rather than ending the
    /// stream.
    pub async fn recv(&self) -> Option<WireEvent> {
        loop {
            match &self.inner {
                SubscriptionInner::Local(rx) => return rx.recv_async().await.ok(),
                SubscriptionInner::Broker(rx) => match rx.recv_async().await {
                    Ok(raw) => match WireEvent::from_json(&raw) {
                        Ok(event) => return Some(event),
                        Err(err) => {
                            tracing::debug!(error = %err, "skipping undecodable broker payload");
                        }
                    },
                    Err(_) => return None,
                },
            }
        }
    }

    /// Non-blocking receive; `None` when nothing is pending or the stream
    /// has ended.
    pub fn try_recv(&self) -> Option<WireEvent> {
        loop {
            match &self.inner {
                SubscriptionInner::Local(rx) => return rx.try_recv().ok(),
                SubscriptionInner::Broker(rx) => match rx.try_recv() {
                    Ok(raw) => match WireEvent::from_json(&raw) {
                        Ok(event) => return Some(event),
                        Err(err) => {
                            tracing::debug!(error = %err, "skipping undecodable broker payload");
                        }
                    },
                    Err(_) => return None,
                },
            }
        }
    }

    /// Adapt into a futures `Stream` for SSE/WebSocket style consumers.
    pub fn into_stream(self) -> impl Stream<Item = WireEvent> {
        stream::unfold(self, |sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}
