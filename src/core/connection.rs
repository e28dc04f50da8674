//! Boundary to the single-endpoint client.
//!
//! The pool never speaks the wire protocol itself. It dials endpoints through
//! a [`Connector`], routes [`Request`]s to the resulting [`Connection`]s and
//! listens for their lifecycle events on a shared queue.
use super::{ConnEvent, ConnEventKind, Request, Response};
use crate::error::ConnectionError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

/// Sending half of the pool's connection event queue.
pub type EventSender = mpsc::Sender<ConnEvent>;

/// Connection handle shared between the pool and in-flight requests.
pub type SharedConnection = Arc<dyn Connection>;

/// A stateful, possibly reconnecting client to one endpoint.
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// Address this connection was dialed with
    fn addr(&self) -> &str;

    /// Whether the connection is usable right now. May flap.
    fn connected_now(&self) -> bool;

    /// Whether the connection is terminally closed.
    fn closed_now(&self) -> bool;

    /// Per-request timeout the connection was configured with
    fn configured_timeout(&self) -> Duration;

    /// Send one request and wait for its response.
    async fn execute(&self, request: Request) -> Result<Response, ConnectionError>;

    /// Close the connection. Emits a `Closed` event.
    async fn close(&self) -> Result<(), ConnectionError>;
}

/// Dials endpoints on behalf of the pool.
///
/// Every connection produced must report its lifecycle on `events`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        addr: &str,
        events: EventSender,
    ) -> Result<SharedConnection, ConnectionError>;
}

/// Publish a lifecycle event without ever blocking the emitter.
///
/// A full queue drops the event; the maintenance refresh picks up closed
/// connections on its next tick.
pub fn emit_event(events: &EventSender, addr: &str, kind: ConnEventKind) {
    match events.try_send(ConnEvent::new(addr, kind)) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            warn!(addr = %event.addr, kind = ?event.kind, "connection event queue full, dropping event");
        }
        Err(TrySendError::Closed(_)) => {}
    }
}
