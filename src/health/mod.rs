//! Role classification for admitted connections
use crate::core::{Connection, Request, Response, Role};
use crate::error::{PoolError, PoolResult};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

/// Introspection function whose first result carries the `ro` flag.
pub const BOX_INFO: &str = "box.info";

/// Asks an instance whether it is currently read-write or read-only.
///
/// Classification only reads from the wire and never touches pool state, so
/// callers invoke it outside of any pool lock.
#[derive(Debug, Clone)]
pub struct RoleClassifier {
    check_timeout: Duration,
}

impl RoleClassifier {
    pub fn new(check_timeout: Duration) -> Self {
        Self { check_timeout }
    }

    /// Get the timeout applied to one classification call
    pub fn check_timeout(&self) -> Duration {
        self.check_timeout
    }

    /// Classify with the configured timeout.
    pub async fn classify(&self, conn: &dyn Connection) -> PoolResult<Role> {
        match timeout(self.check_timeout, classify_role(conn)).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::timeout(format!("{} on {}", BOX_INFO, conn.addr()))),
        }
    }
}

impl Default for RoleClassifier {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Issue `box.info` on `conn` and read its role.
pub async fn classify_role(conn: &dyn Connection) -> PoolResult<Role> {
    let response = conn
        .execute(Request::Call17 {
            function: BOX_INFO.to_string(),
            args: json!([]),
        })
        .await?;

    role_from_response(&response)
}

/// Interpret a `box.info` reply: `ro == false` is a master, `ro == true` a
/// replica, anything else is malformed.
pub fn role_from_response(response: &Response) -> PoolResult<Role> {
    let info = response
        .first()
        .ok_or_else(|| PoolError::incorrect_response("empty box.info reply"))?;

    match info.get("ro") {
        Some(Value::Bool(false)) => Ok(Role::Master),
        Some(Value::Bool(true)) => Ok(Role::Replica),
        Some(other) => Err(PoolError::incorrect_response(format!(
            "unexpected ro flag: {}",
            other
        ))),
        None => Err(PoolError::incorrect_response("box.info reply has no ro flag")),
    }
}
