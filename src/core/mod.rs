//! Core data model shared by the pool, the role classifier and connectors.
pub mod connection;

pub use connection::{emit_event, Connection, Connector, EventSender, SharedConnection};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Routing mode attached to a request.
///
/// The mode selects which subpool may answer the request and in which
/// order the subpools are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Only a writable (master) instance may answer.
    #[serde(rename = "rw")]
    RW,
    /// Prefer a master, fall back to a replica.
    #[serde(rename = "prefer_rw")]
    PreferRW,
    /// Prefer a replica, fall back to a master.
    #[serde(rename = "prefer_ro")]
    PreferRO,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::RW => write!(f, "rw"),
            Mode::PreferRW => write!(f, "prefer_rw"),
            Mode::PreferRO => write!(f, "prefer_ro"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rw" => Ok(Mode::RW),
            "prefer_rw" | "preferrw" => Ok(Mode::PreferRW),
            "prefer_ro" | "preferro" => Ok(Mode::PreferRO),
            other => Err(format!("unknown routing mode: {}", other)),
        }
    }
}

/// Role of an instance, derived from its `ro` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Master,
    Replica,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Replica => write!(f, "replica"),
        }
    }
}

/// Point-in-time information about one admitted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub connected_now: bool,
    pub role: Role,
}

/// Lifecycle notification emitted by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnEvent {
    pub addr: String,
    pub kind: ConnEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnEventKind {
    Connected,
    Disconnected,
    Closed,
}

impl ConnEvent {
    pub fn new<S: Into<String>>(addr: S, kind: ConnEventKind) -> Self {
        Self {
            addr: addr.into(),
            kind,
        }
    }
}

/// Index iterator used by select requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IteratorType {
    #[default]
    Eq,
    Req,
    All,
    Lt,
    Le,
    Ge,
    Gt,
}

/// A single operation, as handed to a [`Connection`].
///
/// Spaces and indexes may be referenced by name or by number, so they are
/// carried as plain values.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Ping,
    Select {
        space: Value,
        index: Value,
        offset: u32,
        limit: u32,
        iterator: IteratorType,
        key: Value,
    },
    Insert {
        space: Value,
        tuple: Value,
    },
    Replace {
        space: Value,
        tuple: Value,
    },
    Delete {
        space: Value,
        index: Value,
        key: Value,
    },
    Update {
        space: Value,
        index: Value,
        key: Value,
        ops: Value,
    },
    Upsert {
        space: Value,
        tuple: Value,
        ops: Value,
    },
    /// Call with 1.6 semantics: every returned row is converted to an array.
    Call {
        function: String,
        args: Value,
    },
    Call17 {
        function: String,
        args: Value,
    },
    Eval {
        expr: String,
        args: Value,
    },
}

impl Request {
    /// Short operation name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Select { .. } => "select",
            Request::Insert { .. } => "insert",
            Request::Replace { .. } => "replace",
            Request::Delete { .. } => "delete",
            Request::Update { .. } => "update",
            Request::Upsert { .. } => "upsert",
            Request::Call { .. } => "call",
            Request::Call17 { .. } => "call17",
            Request::Eval { .. } => "eval",
        }
    }

    /// Whether the request modifies data on the instance.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Request::Insert { .. }
                | Request::Replace { .. }
                | Request::Delete { .. }
                | Request::Update { .. }
                | Request::Upsert { .. }
        )
    }
}

/// Decoded response body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub data: Vec<Value>,
}

impl Response {
    pub fn new(data: Vec<Value>) -> Self {
        Self { data }
    }

    pub fn first(&self) -> Option<&Value> {
        self.data.first()
    }

    /// Decode the whole body into a typed result.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Array(self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mode_display_and_parse() {
        for mode in [Mode::RW, Mode::PreferRW, Mode::PreferRO] {
            assert_eq!(mode.to_string().parse::<Mode>().unwrap(), mode);
        }
        assert_eq!("PreferRO".parse::<Mode>().unwrap(), Mode::PreferRO);
        assert!("any".parse::<Mode>().is_err());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Master.to_string(), "master");
        assert_eq!(Role::Replica.to_string(), "replica");
    }

    #[test]
    fn test_request_classification() {
        let insert = Request::Insert {
            space: json!("test"),
            tuple: json!([1, "a"]),
        };
        assert!(insert.is_write());
        assert_eq!(insert.name(), "insert");

        let eval = Request::Eval {
            expr: "return 1".to_string(),
            args: json!([]),
        };
        assert!(!eval.is_write());
        assert_eq!(Request::Ping.name(), "ping");
    }

    #[test]
    fn test_response_decode() {
        let response = Response::new(vec![json!([1, "one"]), json!([2, "two"])]);
        assert_eq!(response.first(), Some(&json!([1, "one"])));

        let rows: Vec<(u64, String)> = response.decode().unwrap();
        assert_eq!(rows, vec![(1, "one".to_string()), (2, "two".to_string())]);
    }

    #[test]
    fn test_response_decode_mismatch() {
        let response = Response::new(vec![json!({"ro": true})]);
        let decoded: Result<Vec<Vec<String>>, _> = response.decode();
        assert!(decoded.is_err());
    }
}
