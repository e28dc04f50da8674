//! Liveness-skipping round-robin subpool
//!
//! Members are never removed just because they are not connected right now.
//! Dead entries stay in place and only the rotating cursor adapts; removal is
//! reserved for topology changes decided by the pool.
use crate::core::SharedConnection;
use crate::error::ConnectionError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered connections for one role, indexed by address.
#[derive(Debug, Default)]
pub struct RoundRobin {
    conns: Vec<(String, SharedConnection)>,
    index_by_addr: HashMap<String, usize>,
    current: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(size: usize) -> Self {
        Self {
            conns: Vec::with_capacity(size),
            index_by_addr: HashMap::with_capacity(size),
            current: AtomicUsize::new(0),
        }
    }

    /// Append a connection. The address must not already be present.
    pub fn add_conn(&mut self, addr: &str, conn: SharedConnection) {
        debug_assert!(!self.index_by_addr.contains_key(addr));
        self.index_by_addr.insert(addr.to_string(), self.conns.len());
        self.conns.push((addr.to_string(), conn));
    }

    /// Remove the connection for `addr`, if present.
    pub fn delete_by_addr(&mut self, addr: &str) -> Option<SharedConnection> {
        let index = self.index_by_addr.remove(addr)?;
        let (_, conn) = self.conns.remove(index);

        // Positions after `index` shifted; rebuild the whole map.
        self.index_by_addr.clear();
        for (index, (addr, _)) in self.conns.iter().enumerate() {
            self.index_by_addr.insert(addr.clone(), index);
        }

        Some(conn)
    }

    pub fn get_by_addr(&self, addr: &str) -> Option<SharedConnection> {
        self.index_by_addr
            .get(addr)
            .map(|&index| self.conns[index].1.clone())
    }

    pub fn contains(&self, addr: &str) -> bool {
        self.index_by_addr.contains_key(addr)
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    /// Member addresses in rotation order
    pub fn addrs(&self) -> impl Iterator<Item = &str> {
        self.conns.iter().map(|(addr, _)| addr.as_str())
    }

    /// Every member, alive or not
    pub fn conns(&self) -> impl Iterator<Item = &SharedConnection> {
        self.conns.iter().map(|(_, conn)| conn)
    }

    fn next_index(&self) -> usize {
        self.current.fetch_add(1, Ordering::Relaxed).wrapping_add(1) % self.conns.len()
    }

    /// Pick the next connected member, skipping dead ones.
    ///
    /// When the scan had to skip, the cursor is moved to the member that was
    /// found so the following calls continue from there.
    pub fn next_alive(&self) -> Option<SharedConnection> {
        let size = self.conns.len();
        if size == 0 {
            return None;
        }

        let next = self.next_index();
        for offset in 0..size {
            let index = (next + offset) % size;
            let conn = &self.conns[index].1;
            if conn.connected_now() {
                if offset != 0 {
                    self.current.store(index, Ordering::Relaxed);
                }
                return Some(conn.clone());
            }
        }

        None
    }

    /// Close every member once and collect the failures.
    pub async fn close_all(&self) -> Vec<ConnectionError> {
        let mut errors = Vec::new();
        for (addr, conn) in &self.conns {
            if let Err(e) = conn.close().await {
                tracing::warn!(addr = %addr, error = %e, "failed to close connection");
                errors.push(e);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Connection, Request, Response};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    struct MockConnection {
        addr: String,
        alive: AtomicBool,
        closed: AtomicBool,
        fail_close: bool,
    }

    impl MockConnection {
        fn new(addr: &str, alive: bool) -> Arc<Self> {
            Arc::new(Self {
                addr: addr.to_string(),
                alive: AtomicBool::new(alive),
                closed: AtomicBool::new(false),
                fail_close: false,
            })
        }

        fn failing(addr: &str) -> Arc<Self> {
            Arc::new(Self {
                addr: addr.to_string(),
                alive: AtomicBool::new(true),
                closed: AtomicBool::new(false),
                fail_close: true,
            })
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        fn addr(&self) -> &str {
            &self.addr
        }

        fn connected_now(&self) -> bool {
            self.alive.load(Ordering::SeqCst)
        }

        fn closed_now(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        fn configured_timeout(&self) -> Duration {
            Duration::from_millis(500)
        }

        async fn execute(&self, _request: Request) -> Result<Response, ConnectionError> {
            Ok(Response::default())
        }

        async fn close(&self) -> Result<(), ConnectionError> {
            self.closed.store(true, Ordering::SeqCst);
            self.alive.store(false, Ordering::SeqCst);
            if self.fail_close {
                return Err(ConnectionError::client("close failed"));
            }
            Ok(())
        }
    }

    fn pool_of(conns: &[Arc<MockConnection>]) -> RoundRobin {
        let mut rr = RoundRobin::with_capacity(conns.len());
        for conn in conns {
            rr.add_conn(&conn.addr, conn.clone());
        }
        rr
    }

    fn addr_of(conn: &SharedConnection) -> String {
        conn.addr().to_string()
    }

    #[test]
    fn test_add_and_get() {
        let rr = pool_of(&[MockConnection::new("a", true), MockConnection::new("b", true)]);

        assert_eq!(rr.len(), 2);
        assert!(!rr.is_empty());
        assert_eq!(addr_of(&rr.get_by_addr("b").unwrap()), "b");
        assert!(rr.get_by_addr("c").is_none());
        assert_eq!(rr.addrs().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_delete_rebuilds_index() {
        let mut rr = pool_of(&[
            MockConnection::new("a", true),
            MockConnection::new("b", true),
            MockConnection::new("c", true),
            MockConnection::new("d", true),
        ]);

        let removed = rr.delete_by_addr("b").unwrap();
        assert_eq!(addr_of(&removed), "b");
        assert_eq!(rr.len(), 3);

        // Every remaining lookup points at the right, shifted element.
        for addr in ["a", "c", "d"] {
            assert_eq!(addr_of(&rr.get_by_addr(addr).unwrap()), addr);
        }
        assert!(rr.get_by_addr("b").is_none());
        assert!(rr.delete_by_addr("b").is_none());

        rr.delete_by_addr("d").unwrap();
        rr.delete_by_addr("a").unwrap();
        assert_eq!(addr_of(&rr.get_by_addr("c").unwrap()), "c");
        rr.delete_by_addr("c").unwrap();
        assert!(rr.is_empty());
        assert!(rr.delete_by_addr("c").is_none());
    }

    #[test]
    fn test_delete_returns_dead_connection() {
        let mut rr = pool_of(&[MockConnection::new("a", false)]);
        let removed = rr.delete_by_addr("a");
        assert!(removed.is_some());
        assert!(!removed.unwrap().connected_now());
    }

    #[test]
    fn test_next_alive_rotates() {
        let rr = pool_of(&[
            MockConnection::new("a", true),
            MockConnection::new("b", true),
            MockConnection::new("c", true),
        ]);

        let picks: Vec<String> = (0..6).map(|_| addr_of(&rr.next_alive().unwrap())).collect();
        assert_eq!(picks, vec!["b", "c", "a", "b", "c", "a"]);
    }

    #[test]
    fn test_next_alive_skips_single_dead_member() {
        let conns = [
            MockConnection::new("a", true),
            MockConnection::new("b", false),
            MockConnection::new("c", true),
            MockConnection::new("d", true),
            MockConnection::new("e", true),
        ];
        let rr = pool_of(&conns);
        let n = conns.len();

        let picks: Vec<String> = (0..n).map(|_| addr_of(&rr.next_alive().unwrap())).collect();
        assert!(!picks.contains(&"b".to_string()));

        // The first n - 1 picks visit every live member exactly once.
        let distinct: HashSet<&String> = picks[..n - 1].iter().collect();
        assert_eq!(distinct.len(), n - 1);
    }

    #[test]
    fn test_next_alive_persists_cursor_after_skip() {
        let rr = pool_of(&[
            MockConnection::new("a", true),
            MockConnection::new("b", false),
            MockConnection::new("c", false),
            MockConnection::new("d", true),
        ]);

        // Cursor advances to b, skips to d and stays there.
        assert_eq!(addr_of(&rr.next_alive().unwrap()), "d");
        assert_eq!(addr_of(&rr.next_alive().unwrap()), "a");
        assert_eq!(addr_of(&rr.next_alive().unwrap()), "d");
    }

    #[test]
    fn test_next_alive_all_dead_or_empty() {
        let rr = pool_of(&[MockConnection::new("a", false), MockConnection::new("b", false)]);
        assert!(rr.next_alive().is_none());
        assert!(RoundRobin::new().next_alive().is_none());
    }

    #[test]
    fn test_next_alive_recovers_when_member_comes_back() {
        let a = MockConnection::new("a", false);
        let rr = pool_of(&[a.clone()]);
        assert!(rr.next_alive().is_none());

        a.alive.store(true, Ordering::SeqCst);
        assert_eq!(addr_of(&rr.next_alive().unwrap()), "a");
    }

    #[tokio::test]
    async fn test_close_all_collects_errors() {
        let conns = [
            MockConnection::failing("a"),
            MockConnection::new("b", true),
            MockConnection::failing("c"),
        ];
        let rr = pool_of(&conns);

        let errors = rr.close_all().await;
        assert_eq!(errors.len(), 2);

        // A failure does not stop the remaining members from being closed.
        assert!(conns.iter().all(|conn| conn.closed_now()));
    }
}
