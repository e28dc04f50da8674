//! Background upkeep of the pool topology
//!
//! One task per pool. It reacts to connection close events, periodically
//! re-probes every endpoint for role changes and, when a discovery function
//! is configured, reconciles the managed address set with the cluster.
use super::PoolShared;
use crate::core::{ConnEvent, ConnEventKind};
use crate::error::PoolError;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

pub(super) struct Maintenance {
    shared: Arc<PoolShared>,
    events: mpsc::Receiver<ConnEvent>,
    shutdown: watch::Receiver<bool>,
}

fn ticker(period: std::time::Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl Maintenance {
    pub(super) fn new(
        shared: Arc<PoolShared>,
        events: mpsc::Receiver<ConnEvent>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            shared,
            events,
            shutdown,
        }
    }

    pub(super) async fn run(mut self) {
        let mut probe = ticker(self.shared.options.check_interval);
        let mut discovery = ticker(self.shared.options.discovery_interval);
        let discovery_enabled = self.shared.options.discovery_function.is_some();

        debug!("maintenance task started");
        while !self.shared.is_closed() {
            tokio::select! {
                biased;

                // Fires on close and when the pool handle is dropped.
                _ = self.shutdown.changed() => break,
                Some(event) = self.events.recv() => self.on_event(event).await,
                _ = discovery.tick(), if discovery_enabled => self.discover().await,
                _ = probe.tick() => self.refresh_all().await,
            }
        }
        debug!("maintenance task stopped");
    }

    async fn on_event(&self, event: ConnEvent) {
        if event.kind != ConnEventKind::Closed {
            trace!(addr = %event.addr, kind = ?event.kind, "connection event");
            return;
        }
        if self.shared.is_closed() {
            return;
        }

        let Some((conn, _)) = self.shared.lookup(&event.addr).await else {
            debug!(addr = %event.addr, "close event for unmanaged address");
            return;
        };
        // The entry may already have been replaced by a fresh connection.
        if !conn.closed_now() {
            debug!(addr = %event.addr, "stale close event");
            return;
        }

        self.reopen(&event.addr).await;
    }

    /// Redial `addr` and put it back under its current role, or evict it.
    async fn reopen(&self, addr: &str) {
        match self.shared.dial_and_admit(addr).await {
            Ok(role) => info!(addr = %addr, role = %role, "reconnected"),
            Err(PoolError::Closed) => {}
            Err(e) => {
                warn!(addr = %addr, error = %e, "reconnect failed, evicting");
                self.shared.evict(addr).await;
            }
        }
    }

    async fn refresh_all(&self) {
        for addr in self.shared.addrs().await {
            if self.shared.is_closed() {
                return;
            }
            self.refresh(&addr).await;
        }
    }

    async fn refresh(&self, addr: &str) {
        match self.shared.lookup(addr).await {
            Some((conn, _)) if conn.closed_now() => self.reopen(addr).await,
            Some((conn, current)) => match self.shared.classifier.classify(conn.as_ref()).await {
                Ok(role) if role != current => {
                    if self.shared.relocate(addr, &conn, role).await {
                        info!(addr = %addr, from = %current, to = %role, "role changed");
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(addr = %addr, error = %e, "role probe failed"),
            },
            None => match self.shared.dial_and_admit(addr).await {
                Ok(role) => info!(addr = %addr, role = %role, "instance admitted"),
                Err(e) => trace!(addr = %addr, error = %e, "instance still unreachable"),
            },
        }
    }

    async fn discover(&self) {
        let Some(function) = self.shared.options.discovery_function.as_deref() else {
            return;
        };

        let discovered = match self.shared.discover_addrs(function).await {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!(function = %function, error = %e, "discovery call failed");
                return;
            }
        };
        if discovered.is_empty() {
            debug!(function = %function, "discovery returned no instances");
            return;
        }

        let known = self.shared.addrs().await;
        for addr in discovered.iter().filter(|addr| !known.contains(addr)) {
            if self.shared.is_closed() {
                return;
            }
            match self.shared.dial_and_admit(addr).await {
                Ok(role) => info!(addr = %addr, role = %role, "discovered instance added"),
                Err(e) => warn!(addr = %addr, error = %e, "discovered instance unreachable"),
            }
        }

        for addr in known.iter().filter(|addr| !discovered.contains(addr)) {
            if let Some((conn, role)) = self.shared.evict(addr).await {
                if let Err(e) = conn.close().await {
                    warn!(addr = %addr, error = %e, "failed to close removed instance");
                }
                info!(addr = %addr, role = %role, "instance removed");
            }
        }

        self.shared.set_addrs(discovered).await;
    }
}
