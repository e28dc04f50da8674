//! tntpool - role-aware connection pool for master/replica clusters
//!
//! The pool holds one connection per configured instance and routes each
//! request by [`Mode`]:
//!
//! - [`Mode::RW`]: masters only
//! - [`Mode::PreferRW`]: masters, or replicas when there are no masters
//! - [`Mode::PreferRO`]: replicas, or masters when there are no replicas
//!
//! Instance roles are learned from `box.info` and re-checked in the
//! background, so a failover is picked up without restarting the client.
//! Connections come from a [`Connector`]; the [`sim`] module provides an
//! in-memory one.
//!
//! ```no_run
//! use tntpool::core::Mode;
//! use tntpool::pool::ConnectionPool;
//! use tntpool::sim::SimCluster;
//!
//! # async fn run() -> tntpool::error::PoolResult<()> {
//! let cluster = SimCluster::new();
//! cluster.add_node("127.0.0.1:3301", false);
//! cluster.add_node("127.0.0.1:3302", true);
//!
//! let pool = ConnectionPool::connect(cluster.addrs(), cluster.connector()).await?;
//! pool.ping(&[Mode::PreferRO]).await?;
//! pool.close().await;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub mod core;
pub mod error;
pub mod health;
pub mod pool;
pub mod sim;

pub use crate::core::{
    ConnEvent, ConnEventKind, Connection, ConnectionInfo, Connector, IteratorType, Mode, Request,
    Response, Role,
};
pub use crate::error::{ConfigError, ConnectionError, PoolError, PoolResult};
pub use crate::pool::{ConnectionPool, PoolOptions, ResponseFuture};
