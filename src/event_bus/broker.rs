//! Durable broker contract for the preferred event transport.
//!
//! The bus treats the broker as expendable: any error here demotes the bus
//! to in-process fan-out until someone reconnects, so implementations should
//! fail fast rather than block the publisher.

use std::fmt;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

/// Errors a broker may surface; all of them trigger the local fallback.
#[derive(Debug, Error, Diagnostic)]
pub enum BrokerError {
    #[error("broker unreachable: {message}")]
    #[diagnostic(
        code(quarrel::broker::unreachable),
        help("The bus falls back to in-process delivery; reconnect the broker when it recovers.")
    )]
    Unreachable { message: String },

    #[error("broker subscription closed")]
    #[diagnostic(code(quarrel::broker::closed))]
    Closed,

    #[error("broker payload error: {0}")]
    #[diagnostic(code(quarrel::broker::payload))]
    Payload(#[from] serde_json::Error),
}

impl BrokerError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }
}

/// Channel name carrying one run's events on the broker.
#[must_use]
pub fn run_channel(run_id: &str) -> String {
    format!("run:{run_id}:events")
}

/// Durable publish/subscribe transport (e.g. an external message broker).
///
/// Payloads are the JSON form of [`WireEvent`](super::WireEvent). `subscribe`
/// hands back a receiver whose closing signals the end of the brokered
/// stream; per-subscriber ordering must match publish order.
#[async_trait]
pub trait EventBroker: Send + Sync + fmt::Debug {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError>;

    async fn subscribe(&self, channel: &str) -> Result<flume::Receiver<String>, BrokerError>;
}
