//! Role-aware connection pool
//!
//! The pool keeps one connection per endpoint and sorts them into two
//! round-robin subpools: `rw` for masters and `ro` for replicas. Requests are
//! routed by [`Mode`]; a background maintenance task keeps the subpools in
//! line with what the cluster actually looks like.
pub mod future;
mod maintenance;
pub mod round_robin;


pub use future::ResponseFuture;
pub use round_robin::RoundRobin;

use crate::core::{
    ConnEvent, ConnectionInfo, Connector, EventSender, IteratorType, Mode, Request,
    Response, Role, SharedConnection,
};
use crate::error::{ConfigError, PoolError, PoolResult};
use crate::health::RoleClassifier;
use futures::future::join_all;
use maintenance::Maintenance;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

/// Default probe interval used by [`ConnectionPool::connect`]
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);
/// Default topology discovery interval
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(60);
/// Default bound for dial and classification calls issued by the pool
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// x10 to accept disconnected and closed events from every endpoint with a margin
const EVENT_QUEUE_FACTOR: usize = 10;

const STATE_OPEN: u8 = 0;
const STATE_CLOSED: u8 = 1;

/// Pool tuning options
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOptions {
    /// How often every endpoint is re-probed for liveness and role
    pub check_interval: Duration,
    /// Remote function returning the current cluster members as `[[addr, ...]]`
    pub discovery_function: Option<String>,
    /// How often the discovery function is called
    pub discovery_interval: Duration,
    /// Bound for each dial and role probe issued by the pool itself
    pub probe_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            discovery_function: None,
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

impl PoolOptions {
    fn validated(mut self) -> Result<Self, ConfigError> {
        if self.check_interval.is_zero() {
            return Err(ConfigError::WrongCheckTimeout);
        }
        if self.discovery_interval.is_zero() {
            self.discovery_interval = DEFAULT_DISCOVERY_INTERVAL;
        }
        if self.probe_timeout.is_zero() {
            self.probe_timeout = DEFAULT_PROBE_TIMEOUT;
        }
        if self.discovery_function.as_deref().map_or(false, str::is_empty) {
            self.discovery_function = None;
        }
        Ok(self)
    }
}

/// Addresses under management and the two role subpools.
#[derive(Debug)]
struct Topology {
    addrs: Vec<String>,
    rw: RoundRobin,
    ro: RoundRobin,
}

impl Topology {
    fn new(addrs: Vec<String>) -> Self {
        let size = addrs.len();
        Self {
            addrs,
            rw: RoundRobin::with_capacity(size),
            ro: RoundRobin::with_capacity(size),
        }
    }

    fn subpool_mut(&mut self, role: Role) -> &mut RoundRobin {
        match role {
            Role::Master => &mut self.rw,
            Role::Replica => &mut self.ro,
        }
    }

    fn lookup(&self, addr: &str) -> Option<(SharedConnection, Role)> {
        if let Some(conn) = self.rw.get_by_addr(addr) {
            return Some((conn, Role::Master));
        }
        self.ro.get_by_addr(addr).map(|conn| (conn, Role::Replica))
    }

    fn remove(&mut self, addr: &str) -> Option<(SharedConnection, Role)> {
        if let Some(conn) = self.rw.delete_by_addr(addr) {
            return Some((conn, Role::Master));
        }
        self.ro.delete_by_addr(addr).map(|conn| (conn, Role::Replica))
    }

    fn resolve(&self, mode: Mode) -> PoolResult<SharedConnection> {
        let next_alive = |subpool: &RoundRobin, role: Role| {
            subpool
                .next_alive()
                .ok_or(PoolError::NoAliveInstance { role })
        };

        match mode {
            Mode::RW => {
                if self.rw.is_empty() {
                    return Err(PoolError::NoRwInstance);
                }
                next_alive(&self.rw, Role::Master)
            }
            Mode::PreferRW => {
                if !self.rw.is_empty() {
                    return next_alive(&self.rw, Role::Master);
                }
                if !self.ro.is_empty() {
                    return next_alive(&self.ro, Role::Replica);
                }
                Err(PoolError::NoHealthyInstance)
            }
            Mode::PreferRO => {
                if !self.ro.is_empty() {
                    return next_alive(&self.ro, Role::Replica);
                }
                if !self.rw.is_empty() {
                    return next_alive(&self.rw, Role::Master);
                }
                Err(PoolError::NoHealthyInstance)
            }
        }
    }
}

/// State shared between the pool handle and its maintenance task.
struct PoolShared {
    topology: RwLock<Topology>,
    state: AtomicU8,
    connector: Arc<dyn Connector>,
    classifier: RoleClassifier,
    options: PoolOptions,
    events: EventSender,
}

impl PoolShared {
    fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_CLOSED
    }

    async fn resolve(&self, mode: Mode) -> PoolResult<SharedConnection> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        self.topology.read().await.resolve(mode)
    }

    async fn lookup(&self, addr: &str) -> Option<(SharedConnection, Role)> {
        self.topology.read().await.lookup(addr)
    }

    async fn addrs(&self) -> Vec<String> {
        self.topology.read().await.addrs.clone()
    }

    async fn dial(&self, addr: &str) -> PoolResult<SharedConnection> {
        match timeout(
            self.options.probe_timeout,
            self.connector.connect(addr, self.events.clone()),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(PoolError::timeout(format!("connect to {}", addr))),
        }
    }

    /// Dial `addr` and learn its role. Runs without holding the topology lock.
    async fn dial_and_classify(&self, addr: &str) -> PoolResult<(SharedConnection, Role)> {
        let conn = self.dial(addr).await?;
        match self.classifier.classify(conn.as_ref()).await {
            Ok(role) => Ok((conn, role)),
            Err(e) => {
                let _ = conn.close().await;
                Err(e)
            }
        }
    }

    async fn dial_and_admit(&self, addr: &str) -> PoolResult<Role> {
        let (conn, role) = self.dial_and_classify(addr).await?;
        self.admit(addr, conn, role).await?;
        Ok(role)
    }

    /// Put `conn` into the subpool for `role`, replacing any prior entry for
    /// the address.
    async fn admit(&self, addr: &str, conn: SharedConnection, role: Role) -> PoolResult<()> {
        let mut topology = self.topology.write().await;
        if self.is_closed() {
            drop(topology);
            let _ = conn.close().await;
            return Err(PoolError::Closed);
        }

        let replaced = topology.remove(addr);
        topology.subpool_mut(role).add_conn(addr, conn.clone());
        drop(topology);

        if let Some((old, _)) = replaced {
            if !Arc::ptr_eq(&old, &conn) && !old.closed_now() {
                let _ = old.close().await;
            }
        }
        Ok(())
    }

    async fn evict(&self, addr: &str) -> Option<(SharedConnection, Role)> {
        let mut topology = self.topology.write().await;
        if self.is_closed() {
            return None;
        }
        topology.remove(addr)
    }

    /// Move `conn` to the subpool for `role` in one critical section.
    ///
    /// Returns false if the address no longer maps to `conn`.
    async fn relocate(&self, addr: &str, conn: &SharedConnection, role: Role) -> bool {
        let mut topology = self.topology.write().await;
        if self.is_closed() {
            return false;
        }
        match topology.lookup(addr) {
            Some((current, current_role)) if Arc::ptr_eq(&current, conn) && current_role != role => {
                topology.remove(addr);
                topology.subpool_mut(role).add_conn(addr, current);
                true
            }
            _ => false,
        }
    }

    async fn set_addrs(&self, addrs: Vec<String>) {
        let mut topology = self.topology.write().await;
        if !self.is_closed() {
            topology.addrs = addrs;
        }
    }

    /// Dial and classify every configured address, then admit the ones that
    /// answered. Returns whether at least one admitted connection is live.
    async fn fill(&self) -> bool {
        let addrs = self.addrs().await;
        let probes = join_all(addrs.iter().map(|addr| self.dial_and_classify(addr))).await;

        let mut somebody_alive = false;
        for (addr, probe) in addrs.iter().zip(probes) {
            match probe {
                Ok((conn, role)) => {
                    let alive = conn.connected_now();
                    match self.admit(addr, conn, role).await {
                        Ok(()) => {
                            debug!(addr = %addr, role = %role, "admitted connection");
                            somebody_alive |= alive;
                        }
                        Err(e) => warn!(addr = %addr, error = %e, "storing connection failed"),
                    }
                }
                Err(e) => warn!(addr = %addr, error = %e, "connect failed"),
            }
        }

        somebody_alive
    }

    /// Ask the cluster for its current member list.
    async fn discover_addrs(&self, function: &str) -> PoolResult<Vec<String>> {
        let conn = self.resolve(Mode::RW).await?;
        let response = conn
            .execute(Request::Call17 {
                function: function.to_string(),
                args: json!([]),
            })
            .await?;

        let nodes: Vec<Vec<String>> = response.decode()?;
        Ok(nodes.into_iter().next().map(dedup).unwrap_or_default())
    }

    async fn close_connections(&self) -> Vec<PoolError> {
        let topology = self.topology.write().await;
        let mut errors = topology.rw.close_all().await;
        errors.extend(topology.ro.close_all().await);
        errors.into_iter().map(PoolError::from).collect()
    }
}

fn dedup<I, S>(addrs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    addrs
        .into_iter()
        .map(Into::into)
        .filter(|addr: &String| seen.insert(addr.clone()))
        .collect()
}

fn select_mode(default: Mode, modes: &[Mode]) -> PoolResult<Mode> {
    match modes {
        [] => Ok(default),
        [mode] => Ok(*mode),
        _ => Err(PoolError::TooManyModes),
    }
}

/// A pool of connections to a master/replica cluster.
///
/// Every data operation accepts `modes`: either empty (use the operation's
/// default mode) or a single [`Mode`] override. Reads default to
/// [`Mode::PreferRO`]; writes, calls and evals default to [`Mode::RW`].
///
/// Dropping the pool stops its maintenance task; call [`ConnectionPool::close`]
/// to also close the connections deterministically.
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
    shutdown: watch::Sender<bool>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("options", &self.shared.options)
            .field("closed", &self.shared.is_closed())
            .finish()
    }
}

impl ConnectionPool {
    /// Connect to `addrs` with default options.
    pub async fn connect<I, S, C>(addrs: I, connector: C) -> PoolResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: Connector + 'static,
    {
        Self::connect_with_opts(addrs, connector, PoolOptions::default()).await
    }

    /// Connect to `addrs`, classify every reachable instance and start the
    /// maintenance task.
    ///
    /// Fails if `addrs` is empty, if the check interval is zero, or if not a
    /// single instance could be admitted.
    pub async fn connect_with_opts<I, S, C>(
        addrs: I,
        connector: C,
        opts: PoolOptions,
    ) -> PoolResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        C: Connector + 'static,
    {
        let addrs = dedup(addrs);
        if addrs.is_empty() {
            return Err(ConfigError::EmptyAddrs.into());
        }
        let options = opts.validated()?;

        let (events_tx, events_rx) = mpsc::channel::<ConnEvent>(EVENT_QUEUE_FACTOR * addrs.len());
        let shared = Arc::new(PoolShared {
            topology: RwLock::new(Topology::new(addrs)),
            state: AtomicU8::new(STATE_OPEN),
            connector: Arc::new(connector),
            classifier: RoleClassifier::new(options.probe_timeout),
            options,
            events: events_tx,
        });

        if !shared.fill().await {
            shared.state.store(STATE_CLOSED, Ordering::Release);
            shared.close_connections().await;
            return Err(PoolError::NoConnection);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(Maintenance::new(shared.clone(), events_rx, shutdown_rx).run());

        {
            let topology = shared.topology.read().await;
            info!(
                masters = topology.rw.len(),
                replicas = topology.ro.len(),
                "connection pool started"
            );
        }

        Ok(Self {
            shared,
            shutdown: shutdown_tx,
        })
    }

    /// Pick the connection a request with `mode` would be sent to.
    pub async fn resolve(&self, mode: Mode) -> PoolResult<SharedConnection> {
        self.shared.resolve(mode).await
    }

    /// Whether the pool is open and the connection `mode` resolves to is
    /// connected right now.
    pub async fn connected_now(&self, mode: Mode) -> PoolResult<bool> {
        match self.shared.resolve(mode).await {
            Ok(conn) => Ok(!self.shared.is_closed() && conn.connected_now()),
            Err(PoolError::Closed) | Err(PoolError::NoAliveInstance { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Request timeout of the connection `mode` resolves to.
    pub async fn configured_timeout(&self, mode: Mode) -> PoolResult<Duration> {
        Ok(self.shared.resolve(mode).await?.configured_timeout())
    }

    /// Addresses currently under management
    pub async fn addrs(&self) -> Vec<String> {
        self.shared.addrs().await
    }

    pub fn discovery_function(&self) -> Option<&str> {
        self.shared.options.discovery_function.as_deref()
    }

    pub fn options(&self) -> &PoolOptions {
        &self.shared.options
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Snapshot of every managed address that is admitted to a subpool.
    pub async fn status(&self) -> HashMap<String, ConnectionInfo> {
        let topology = self.shared.topology.read().await;
        topology
            .addrs
            .iter()
            .filter_map(|addr| {
                topology.lookup(addr).map(|(conn, role)| {
                    (
                        addr.clone(),
                        ConnectionInfo {
                            connected_now: conn.connected_now(),
                            role,
                        },
                    )
                })
            })
            .collect()
    }

    /// Close the pool: stop maintenance and close every connection.
    ///
    /// Only the first call does any work; later calls return no errors.
    pub async fn close(&self) -> Vec<PoolError> {
        if self
            .shared
            .state
            .compare_exchange(STATE_OPEN, STATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("connection pool already closed");
            return Vec::new();
        }

        let _ = self.shutdown.send(true);
        let errors = self.shared.close_connections().await;
        info!(errors = errors.len(), "connection pool closed");
        errors
    }

    async fn execute(&self, default: Mode, modes: &[Mode], request: Request) -> PoolResult<Response> {
        let mode = select_mode(default, modes)?;
        let conn = self.shared.resolve(mode).await?;
        trace!(request = request.name(), mode = %mode, addr = conn.addr(), "routing request");
        Ok(conn.execute(request).await?)
    }

    async fn execute_typed<T: DeserializeOwned>(
        &self,
        default: Mode,
        modes: &[Mode],
        request: Request,
    ) -> PoolResult<T> {
        Ok(self.execute(default, modes, request).await?.decode()?)
    }

    /// Route now, send from a spawned task. Requires a tokio runtime.
    fn execute_async(&self, default: Mode, modes: &[Mode], request: Request) -> ResponseFuture {
        let mode = match select_mode(default, modes) {
            Ok(mode) => mode,
            Err(e) => return ResponseFuture::failed(e),
        };

        let shared = self.shared.clone();
        ResponseFuture::spawned(tokio::spawn(async move {
            let conn = shared.resolve(mode).await?;
            Ok(conn.execute(request).await?)
        }))
    }

    /// Send an empty request to check connectivity.
    pub async fn ping(&self, modes: &[Mode]) -> PoolResult<Response> {
        self.execute(Mode::PreferRO, modes, Request::Ping).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn select(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        offset: u32,
        limit: u32,
        iterator: IteratorType,
        key: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<Response> {
        let request = Request::Select {
            space: space.into(),
            index: index.into(),
            offset,
            limit,
            iterator,
            key: key.into(),
        };
        self.execute(Mode::PreferRO, modes, request).await
    }

    /// Insert a tuple. The instance rejects it if the primary key exists.
    pub async fn insert(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<Response> {
        let request = Request::Insert {
            space: space.into(),
            tuple: tuple.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    /// Insert or replace a tuple with the same primary key.
    pub async fn replace(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<Response> {
        let request = Request::Replace {
            space: space.into(),
            tuple: tuple.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    pub async fn delete(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        key: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<Response> {
        let request = Request::Delete {
            space: space.into(),
            index: index.into(),
            key: key.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    pub async fn update(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        key: impl Into<Value>,
        ops: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<Response> {
        let request = Request::Update {
            space: space.into(),
            index: index.into(),
            key: key.into(),
            ops: ops.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    /// Update a tuple or insert it if missing. The response carries no tuple.
    pub async fn upsert(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        ops: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<Response> {
        let request = Request::Upsert {
            space: space.into(),
            tuple: tuple.into(),
            ops: ops.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    /// Call a stored function; every result row is converted to an array.
    pub async fn call(&self, function: &str, args: impl Into<Value>, modes: &[Mode]) -> PoolResult<Response> {
        let request = Request::Call {
            function: function.to_string(),
            args: args.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    /// Call a stored function and return its results unconverted.
    pub async fn call17(&self, function: &str, args: impl Into<Value>, modes: &[Mode]) -> PoolResult<Response> {
        let request = Request::Call17 {
            function: function.to_string(),
            args: args.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    /// Evaluate an expression on the instance.
    pub async fn eval(&self, expr: &str, args: impl Into<Value>, modes: &[Mode]) -> PoolResult<Response> {
        let request = Request::Eval {
            expr: expr.to_string(),
            args: args.into(),
        };
        self.execute(Mode::RW, modes, request).await
    }

    /// Select at most one tuple by key and decode it.
    pub async fn get_typed<T: DeserializeOwned>(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        key: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Select {
            space: space.into(),
            index: index.into(),
            offset: 0,
            limit: 1,
            iterator: IteratorType::Eq,
            key: key.into(),
        };
        self.execute_typed(Mode::PreferRO, modes, request).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn select_typed<T: DeserializeOwned>(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        offset: u32,
        limit: u32,
        iterator: IteratorType,
        key: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Select {
            space: space.into(),
            index: index.into(),
            offset,
            limit,
            iterator,
            key: key.into(),
        };
        self.execute_typed(Mode::PreferRO, modes, request).await
    }

    pub async fn insert_typed<T: DeserializeOwned>(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Insert {
            space: space.into(),
            tuple: tuple.into(),
        };
        self.execute_typed(Mode::RW, modes, request).await
    }

    pub async fn replace_typed<T: DeserializeOwned>(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Replace {
            space: space.into(),
            tuple: tuple.into(),
        };
        self.execute_typed(Mode::RW, modes, request).await
    }

    pub async fn delete_typed<T: DeserializeOwned>(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        key: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Delete {
            space: space.into(),
            index: index.into(),
            key: key.into(),
        };
        self.execute_typed(Mode::RW, modes, request).await
    }

    pub async fn update_typed<T: DeserializeOwned>(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        key: impl Into<Value>,
        ops: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Update {
            space: space.into(),
            index: index.into(),
            key: key.into(),
            ops: ops.into(),
        };
        self.execute_typed(Mode::RW, modes, request).await
    }

    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        function: &str,
        args: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Call {
            function: function.to_string(),
            args: args.into(),
        };
        self.execute_typed(Mode::RW, modes, request).await
    }

    pub async fn call17_typed<T: DeserializeOwned>(
        &self,
        function: &str,
        args: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Call17 {
            function: function.to_string(),
            args: args.into(),
        };
        self.execute_typed(Mode::RW, modes, request).await
    }

    pub async fn eval_typed<T: DeserializeOwned>(
        &self,
        expr: &str,
        args: impl Into<Value>,
        modes: &[Mode],
    ) -> PoolResult<T> {
        let request = Request::Eval {
            expr: expr.to_string(),
            args: args.into(),
        };
        self.execute_typed(Mode::RW, modes, request).await
    }

    #[allow(clippy::too_many_arguments)]
    pub fn select_async(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        offset: u32,
        limit: u32,
        iterator: IteratorType,
        key: impl Into<Value>,
        modes: &[Mode],
    ) -> ResponseFuture {
        let request = Request::Select {
            space: space.into(),
            index: index.into(),
            offset,
            limit,
            iterator,
            key: key.into(),
        };
        self.execute_async(Mode::PreferRO, modes, request)
    }

    pub fn insert_async(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        modes: &[Mode],
    ) -> ResponseFuture {
        let request = Request::Insert {
            space: space.into(),
            tuple: tuple.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }

    pub fn replace_async(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        modes: &[Mode],
    ) -> ResponseFuture {
        let request = Request::Replace {
            space: space.into(),
            tuple: tuple.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }

    pub fn delete_async(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        key: impl Into<Value>,
        modes: &[Mode],
    ) -> ResponseFuture {
        let request = Request::Delete {
            space: space.into(),
            index: index.into(),
            key: key.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }

    pub fn update_async(
        &self,
        space: impl Into<Value>,
        index: impl Into<Value>,
        key: impl Into<Value>,
        ops: impl Into<Value>,
        modes: &[Mode],
    ) -> ResponseFuture {
        let request = Request::Update {
            space: space.into(),
            index: index.into(),
            key: key.into(),
            ops: ops.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }

    pub fn upsert_async(
        &self,
        space: impl Into<Value>,
        tuple: impl Into<Value>,
        ops: impl Into<Value>,
        modes: &[Mode],
    ) -> ResponseFuture {
        let request = Request::Upsert {
            space: space.into(),
            tuple: tuple.into(),
            ops: ops.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }

    pub fn call_async(&self, function: &str, args: impl Into<Value>, modes: &[Mode]) -> ResponseFuture {
        let request = Request::Call {
            function: function.to_string(),
            args: args.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }

    pub fn call17_async(&self, function: &str, args: impl Into<Value>, modes: &[Mode]) -> ResponseFuture {
        let request = Request::Call17 {
            function: function.to_string(),
            args: args.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }

    pub fn eval_async(&self, expr: &str, args: impl Into<Value>, modes: &[Mode]) -> ResponseFuture {
        let request = Request::Eval {
            expr: expr.to_string(),
            args: args.into(),
        };
        self.execute_async(Mode::RW, modes, request)
    }
}
