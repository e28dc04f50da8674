//! Unified error handling for tntpool
//!
//! Errors are split the way callers need to react to them: configuration
//! errors stop construction, routing errors are returned per call and clear
//! up once maintenance heals the topology, and connection errors come from
//! the endpoint client underneath the pool.

use crate::core::Role;
use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type for pool operations
#[derive(Debug, Error)]
pub enum PoolError {
    /// Invalid construction parameters or configuration file
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Not a single endpoint could be admitted at construction
    #[error("no active connections")]
    NoConnection,

    /// More than one routing mode override was supplied
    #[error("too many arguments")]
    TooManyModes,

    #[error("Can't find rw instance in pool")]
    NoRwInstance,

    #[error("Can't find healthy instance in pool")]
    NoHealthyInstance,

    /// The chosen subpool has members but none of them is connected
    #[error("Can't find alive {role} instance in pool")]
    NoAliveInstance { role: Role },

    /// Reply shape did not match what the pool expected
    #[error("Incorrect response format: {message}")]
    IncorrectResponse { message: String },

    #[error("connection pool is closed")]
    Closed,

    /// Error reported by the endpoint client
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Typed result could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Internal errors (should not happen in normal operation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("addrs should not be empty")]
    EmptyAddrs,

    #[error("wrong check timeout, must be greater than 0")]
    WrongCheckTimeout,

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Errors produced by a single-endpoint connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Network error: {0}")]
    Network(#[from] io::Error),

    #[error("connection to {addr} refused")]
    Refused { addr: String },

    #[error("connection to {addr} is closed")]
    Closed { addr: String },

    /// Error returned by the remote instance
    #[error("Server error {code}: {message}")]
    Server { code: u32, message: String },

    #[error("Client error: {message}")]
    Client { message: String },
}

/// Result type alias for pool operations
pub type PoolResult<T> = Result<T, PoolError>;

impl PoolError {
    /// Create an incorrect response error
    pub fn incorrect_response<S: Into<String>>(message: S) -> Self {
        PoolError::IncorrectResponse {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S) -> Self {
        PoolError::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        PoolError::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        match self {
            PoolError::NoRwInstance
            | PoolError::NoHealthyInstance
            | PoolError::NoAliveInstance { .. }
            | PoolError::Timeout { .. } => true,
            PoolError::Connection(e) => e.is_recoverable(),
            _ => false,
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PoolError::Config(_) => ErrorSeverity::Critical,
            PoolError::Internal { .. } => ErrorSeverity::Critical,
            PoolError::NoConnection => ErrorSeverity::Critical,
            PoolError::Connection(_) => ErrorSeverity::Warning,
            PoolError::NoAliveInstance { .. } => ErrorSeverity::Warning,
            PoolError::Timeout { .. } => ErrorSeverity::Warning,
            PoolError::IncorrectResponse { .. } => ErrorSeverity::Info,
            _ => ErrorSeverity::Error,
        }
    }
}

impl ConnectionError {
    pub fn closed<S: Into<String>>(addr: S) -> Self {
        ConnectionError::Closed { addr: addr.into() }
    }

    pub fn refused<S: Into<String>>(addr: S) -> Self {
        ConnectionError::Refused { addr: addr.into() }
    }

    pub fn server<S: Into<String>>(code: u32, message: S) -> Self {
        ConnectionError::Server {
            code,
            message: message.into(),
        }
    }

    pub fn client<S: Into<String>>(message: S) -> Self {
        ConnectionError::Client {
            message: message.into(),
        }
    }

    /// Server-side errors are answers, not connectivity problems.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ConnectionError::Server { .. } | ConnectionError::Client { .. }
        )
    }
}

/// Error severity levels for logging and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that require immediate attention
    Critical,
    /// Errors that affect functionality but don't crash the system
    Error,
    /// Warnings about potential issues
    Warning,
    /// Informational messages about recoverable issues
    Info,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Warning => write!(f, "WARNING"),
            ErrorSeverity::Info => write!(f, "INFO"),
        }
    }
}
