//! In-process simulated cluster
//!
//! A [`SimCluster`] hosts a set of [`SimNode`]s, each answering the requests
//! the pool relies on: role introspection, stored function calls, a handful of
//! eval expressions and CRUD over in-memory spaces. Nodes can be stopped,
//! restarted, flipped between master and replica, or have their link cut, which
//! makes the cluster a controllable backend for the pool's tests, benchmarks
//! and the `simulate` command.
pub mod space;

use crate::core::{
    emit_event, ConnEventKind, Connection, Connector, EventSender, Request, Response,
    SharedConnection,
};
use crate::error::ConnectionError;
use crate::health::BOX_INFO;
use async_trait::async_trait;
use serde_json::{json, Value};
use space::{SpaceStore, ER_NO_SUCH_PROC, ER_READONLY, ER_UNSUPPORTED};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::debug;

/// Per-request timeout reported by simulated connections
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

const STATE_CONNECTED: u8 = 0;
const STATE_DISCONNECTED: u8 = 1;
const STATE_CLOSED: u8 = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct ClusterInner {
    nodes: Mutex<HashMap<String, Arc<SimNode>>>,
    functions: Mutex<HashMap<String, Vec<Value>>>,
    dials: AtomicUsize,
}

/// Handle to a simulated cluster. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SimCluster {
    inner: Arc<ClusterInner>,
}

impl SimCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a running node, replacing any node with the same address.
    pub fn add_node(&self, addr: &str, read_only: bool) -> Arc<SimNode> {
        let node = Arc::new(SimNode::new(addr, read_only));
        lock(&self.inner.nodes).insert(addr.to_string(), node.clone());
        node
    }

    pub fn node(&self, addr: &str) -> Option<Arc<SimNode>> {
        lock(&self.inner.nodes).get(addr).cloned()
    }

    /// Addresses of every node, sorted
    pub fn addrs(&self) -> Vec<String> {
        let mut addrs: Vec<String> = lock(&self.inner.nodes).keys().cloned().collect();
        addrs.sort();
        addrs
    }

    /// Make `name` callable on every node, returning `results` as-is.
    pub fn register_function(&self, name: &str, results: Vec<Value>) {
        lock(&self.inner.functions).insert(name.to_string(), results);
    }

    pub fn connector(&self) -> SimConnector {
        SimConnector {
            cluster: self.inner.clone(),
        }
    }

    /// Number of dial attempts made through any connector of this cluster
    pub fn dial_count(&self) -> usize {
        self.inner.dials.load(Ordering::SeqCst)
    }

    fn function(&self, name: &str) -> Option<Vec<Value>> {
        lock(&self.inner.functions).get(name).cloned()
    }
}

/// One simulated instance.
#[derive(Debug)]
pub struct SimNode {
    addr: String,
    read_only: AtomicBool,
    running: AtomicBool,
    link_up: AtomicBool,
    store: Mutex<SpaceStore>,
    conns: Mutex<Vec<Weak<SimConnection>>>,
}

impl SimNode {
    fn new(addr: &str, read_only: bool) -> Self {
        Self {
            addr: addr.to_string(),
            read_only: AtomicBool::new(read_only),
            running: AtomicBool::new(true),
            link_up: AtomicBool::new(true),
            store: Mutex::new(SpaceStore::default()),
            conns: Mutex::new(Vec::new()),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    /// Switch the instance between replica (`true`) and master (`false`).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
        debug!(addr = %self.addr, read_only, "node role changed");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the instance. Every open connection to it is closed.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for conn in self.live_conns() {
            conn.terminate();
        }
        debug!(addr = %self.addr, "node stopped");
    }

    /// Start accepting connections again.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        debug!(addr = %self.addr, "node started");
    }

    /// Cut or restore the network link. Connections stay open but are not
    /// usable while the link is down.
    pub fn set_link(&self, up: bool) {
        self.link_up.store(up, Ordering::SeqCst);
        for conn in self.live_conns() {
            conn.set_connected(up);
        }
    }

    /// Number of connections that are open right now
    pub fn open_connections(&self) -> usize {
        self.live_conns()
            .iter()
            .filter(|conn| !conn.closed_now())
            .count()
    }

    fn live_conns(&self) -> Vec<Arc<SimConnection>> {
        let mut conns = lock(&self.conns);
        conns.retain(|conn| conn.strong_count() > 0);
        conns.iter().filter_map(Weak::upgrade).collect()
    }

    fn attach(&self, conn: &Arc<SimConnection>) {
        lock(&self.conns).push(Arc::downgrade(conn));
    }

    fn ensure_writable(&self) -> Result<(), ConnectionError> {
        if self.is_read_only() {
            return Err(ConnectionError::server(
                ER_READONLY,
                "Can't modify data because this instance is in read-only mode.",
            ));
        }
        Ok(())
    }

    fn eval(&self, expr: &str) -> Result<Vec<Value>, ConnectionError> {
        match expr.trim() {
            "return box.cfg.listen" => Ok(vec![json!(self.addr)]),
            "return box.info.ro" => Ok(vec![json!(self.is_read_only())]),
            "return" | "" => Ok(Vec::new()),
            other => Err(ConnectionError::server(
                ER_UNSUPPORTED,
                format!("expression is not supported: {}", other),
            )),
        }
    }

    fn call(&self, cluster: &SimCluster, function: &str) -> Result<Vec<Value>, ConnectionError> {
        if function == BOX_INFO {
            return Ok(vec![json!({
                "ro": self.is_read_only(),
                "status": "running",
                "listen": self.addr,
            })]);
        }
        cluster.function(function).ok_or_else(|| {
            ConnectionError::server(
                ER_NO_SUCH_PROC,
                format!("Procedure '{}' is not defined", function),
            )
        })
    }

    fn handle(&self, cluster: &SimCluster, request: Request) -> Result<Response, ConnectionError> {
        if request.is_write() {
            self.ensure_writable()?;
        }

        let data = match request {
            Request::Ping => Vec::new(),
            Request::Select {
                space,
                offset,
                limit,
                iterator,
                key,
                ..
            } => lock(&self.store).select(&space, &key, offset, limit, iterator),
            Request::Insert { space, tuple } => vec![lock(&self.store).insert(&space, tuple)?],
            Request::Replace { space, tuple } => vec![lock(&self.store).replace(&space, tuple)?],
            Request::Delete { space, key, .. } => {
                lock(&self.store).delete(&space, &key).into_iter().collect()
            }
            Request::Update { space, key, ops, .. } => {
                lock(&self.store).update(&space, &key, &ops)?.into_iter().collect()
            }
            Request::Upsert { space, tuple, ops } => {
                lock(&self.store).upsert(&space, tuple, &ops)?;
                Vec::new()
            }
            Request::Call { function, .. } => self
                .call(cluster, &function)?
                .into_iter()
                .map(|row| match row {
                    Value::Array(_) => row,
                    other => Value::Array(vec![other]),
                })
                .collect(),
            Request::Call17 { function, .. } => self.call(cluster, &function)?,
            Request::Eval { expr, .. } => self.eval(&expr)?,
        };

        Ok(Response::new(data))
    }
}

/// Dials nodes of a [`SimCluster`].
#[derive(Debug, Clone)]
pub struct SimConnector {
    cluster: Arc<ClusterInner>,
}

#[async_trait]
impl Connector for SimConnector {
    async fn connect(
        &self,
        addr: &str,
        events: EventSender,
    ) -> Result<SharedConnection, ConnectionError> {
        let cluster = SimCluster {
            inner: self.cluster.clone(),
        };
        cluster.inner.dials.fetch_add(1, Ordering::SeqCst);

        let node = match cluster.node(addr) {
            Some(node) if node.is_running() => node,
            _ => return Err(ConnectionError::refused(addr)),
        };

        let conn = Arc::new(SimConnection {
            addr: addr.to_string(),
            state: AtomicU8::new(if node.link_up.load(Ordering::SeqCst) {
                STATE_CONNECTED
            } else {
                STATE_DISCONNECTED
            }),
            node: node.clone(),
            cluster,
            events,
        });
        node.attach(&conn);
        emit_event(&conn.events, addr, ConnEventKind::Connected);

        Ok(conn)
    }
}

/// Connection to one [`SimNode`].
#[derive(Debug)]
pub struct SimConnection {
    addr: String,
    state: AtomicU8,
    node: Arc<SimNode>,
    cluster: SimCluster,
    events: EventSender,
}

impl SimConnection {
    fn set_connected(&self, up: bool) {
        let (from, to, kind) = if up {
            (STATE_DISCONNECTED, STATE_CONNECTED, ConnEventKind::Connected)
        } else {
            (STATE_CONNECTED, STATE_DISCONNECTED, ConnEventKind::Disconnected)
        };
        if self
            .state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            emit_event(&self.events, &self.addr, kind);
        }
    }

    /// Close because the peer went away.
    fn terminate(&self) {
        let previous = self.state.swap(STATE_CLOSED, Ordering::SeqCst);
        if previous == STATE_CONNECTED {
            emit_event(&self.events, &self.addr, ConnEventKind::Disconnected);
        }
        if previous != STATE_CLOSED {
            emit_event(&self.events, &self.addr, ConnEventKind::Closed);
        }
    }
}

#[async_trait]
impl Connection for SimConnection {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn connected_now(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_CONNECTED
    }

    fn closed_now(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_CLOSED
    }

    fn configured_timeout(&self) -> Duration {
        DEFAULT_REQUEST_TIMEOUT
    }

    async fn execute(&self, request: Request) -> Result<Response, ConnectionError> {
        match self.state.load(Ordering::SeqCst) {
            STATE_CONNECTED => self.node.handle(&self.cluster, request),
            STATE_CLOSED => Err(ConnectionError::closed(&self.addr)),
            _ => Err(ConnectionError::Network(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is not connected", self.addr),
            ))),
        }
    }

    async fn close(&self) -> Result<(), ConnectionError> {
        if self.state.swap(STATE_CLOSED, Ordering::SeqCst) != STATE_CLOSED {
            emit_event(&self.events, &self.addr, ConnEventKind::Closed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ConnEvent, IteratorType};
    use tokio::sync::mpsc;

    fn events() -> (EventSender, mpsc::Receiver<ConnEvent>) {
        mpsc::channel(16)
    }

    fn drain(rx: &mut mpsc::Receiver<ConnEvent>) -> Vec<ConnEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }

    #[tokio::test]
    async fn test_connect_and_box_info() {
        let cluster = SimCluster::new();
        cluster.add_node("127.0.0.1:3301", true);
        let (tx, mut rx) = events();

        let conn = cluster.connector().connect("127.0.0.1:3301", tx).await.unwrap();
        assert!(conn.connected_now());
        assert_eq!(drain(&mut rx), vec![ConnEventKind::Connected]);

        let response = conn
            .execute(Request::Call17 {
                function: BOX_INFO.to_string(),
                args: json!([]),
            })
            .await
            .unwrap();
        assert_eq!(response.first().unwrap()["ro"], json!(true));
        assert_eq!(cluster.dial_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let cluster = SimCluster::new();
        let node = cluster.add_node("127.0.0.1:3301", false);
        node.stop();
        let (tx, _rx) = events();

        let err = cluster.connector().connect("127.0.0.1:3301", tx.clone()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Refused { .. }));
        let err = cluster.connector().connect("127.0.0.1:9999", tx).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Refused { .. }));
    }

    #[tokio::test]
    async fn test_stop_closes_connections() {
        let cluster = SimCluster::new();
        let node = cluster.add_node("127.0.0.1:3301", false);
        let (tx, mut rx) = events();
        let conn = cluster.connector().connect("127.0.0.1:3301", tx).await.unwrap();
        drain(&mut rx);

        node.stop();
        assert!(conn.closed_now());
        assert_eq!(node.open_connections(), 0);
        assert_eq!(
            drain(&mut rx),
            vec![ConnEventKind::Disconnected, ConnEventKind::Closed]
        );

        let err = conn.execute(Request::Ping).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Closed { .. }));
    }

    #[tokio::test]
    async fn test_link_flap() {
        let cluster = SimCluster::new();
        let node = cluster.add_node("127.0.0.1:3301", false);
        let (tx, mut rx) = events();
        let conn = cluster.connector().connect("127.0.0.1:3301", tx).await.unwrap();
        drain(&mut rx);

        node.set_link(false);
        assert!(!conn.connected_now());
        assert!(!conn.closed_now());
        assert!(matches!(
            conn.execute(Request::Ping).await,
            Err(ConnectionError::Network(_))
        ));

        node.set_link(true);
        assert!(conn.connected_now());
        assert_eq!(
            drain(&mut rx),
            vec![ConnEventKind::Disconnected, ConnEventKind::Connected]
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let cluster = SimCluster::new();
        cluster.add_node("127.0.0.1:3301", false);
        let (tx, mut rx) = events();
        let conn = cluster.connector().connect("127.0.0.1:3301", tx).await.unwrap();
        drain(&mut rx);

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert_eq!(drain(&mut rx), vec![ConnEventKind::Closed]);
    }

    #[tokio::test]
    async fn test_writes_rejected_on_replica() {
        let cluster = SimCluster::new();
        let node = cluster.add_node("127.0.0.1:3301", true);
        let (tx, _rx) = events();
        let conn = cluster.connector().connect("127.0.0.1:3301", tx).await.unwrap();

        let insert = Request::Insert {
            space: json!("test"),
            tuple: json!(["k", "v"]),
        };
        let err = conn.execute(insert.clone()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Server { code: ER_READONLY, .. }));

        node.set_read_only(false);
        conn.execute(insert).await.unwrap();
        let found = conn
            .execute(Request::Select {
                space: json!("test"),
                index: json!("primary"),
                offset: 0,
                limit: 1,
                iterator: IteratorType::Eq,
                key: json!(["k"]),
            })
            .await
            .unwrap();
        assert_eq!(found.data, vec![json!(["k", "v"])]);
    }

    #[tokio::test]
    async fn test_functions_and_eval() {
        let cluster = SimCluster::new();
        cluster.add_node("127.0.0.1:3301", false);
        cluster.register_function("topology", vec![json!(["a", "b"])]);
        cluster.register_function("answer", vec![json!(42)]);
        let (tx, _rx) = events();
        let conn = cluster.connector().connect("127.0.0.1:3301", tx).await.unwrap();

        let call = |function: &str| Request::Call {
            function: function.to_string(),
            args: json!([]),
        };
        assert_eq!(conn.execute(call("answer")).await.unwrap().data, vec![json!([42])]);
        assert_eq!(
            conn.execute(call("topology")).await.unwrap().data,
            vec![json!(["a", "b"])]
        );
        assert!(matches!(
            conn.execute(call("missing")).await,
            Err(ConnectionError::Server { code: ER_NO_SUCH_PROC, .. })
        ));

        let listen = conn
            .execute(Request::Eval {
                expr: "return box.cfg.listen".to_string(),
                args: json!([]),
            })
            .await
            .unwrap();
        assert_eq!(listen.data, vec![json!("127.0.0.1:3301")]);
    }
}
