// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the relay.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Connection to console at {0} timed out")]
    ConnectTimeout(String),

    #[error("Failed to connect to console at {addr}: {reason}")]
    ConnectFailed { addr: String, reason: String },

    #[error("Failed to bind hub listener on port {port}: {reason}")]
    BindFailed { port: u16, reason: String },

    #[error("A client from {0} is already connected")]
    DuplicateIp(std::net::IpAddr),

    #[error("Not connected to the console")]
    NotConnected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for RelayError {
    fn clone(&self) -> Self {
        match self {
            RelayError::Io(e) => RelayError::Io(Arc::clone(e)),
            RelayError::ConnectTimeout(s) => RelayError::ConnectTimeout(s.clone()),
            RelayError::ConnectFailed { addr, reason } => RelayError::ConnectFailed {
                addr: addr.clone(),
                reason: reason.clone(),
            },
            RelayError::BindFailed { port, reason } => RelayError::BindFailed {
                port: *port,
                reason: reason.clone(),
            },
            RelayError::DuplicateIp(ip) => RelayError::DuplicateIp(*ip),
            RelayError::NotConnected => RelayError::NotConnected,
            RelayError::InvalidConfig(s) => RelayError::InvalidConfig(s.clone()),
        }
    }
}

impl PartialEq for RelayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelayError::Io(e1), RelayError::Io(e2)) => e1.to_string() == e2.to_string(),
            (RelayError::ConnectTimeout(s1), RelayError::ConnectTimeout(s2)) => s1 == s2,
            (RelayError::DuplicateIp(a), RelayError::DuplicateIp(b)) => a == b,
            (RelayError::InvalidConfig(s1), RelayError::InvalidConfig(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(Arc::new(e))
    }
}

/// The cause attached to a console `Disconnected` event. The original design
/// collapsed every post-connect failure into a bare signal; carrying the
/// reason keeps the diagnostic information available to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The console closed the connection (clean EOF).
    RemoteClosed,
    /// A read or write on the console stream failed.
    StreamError(String),
    /// The console reported a failed login before confirmation.
    LoginRejected,
    /// `disconnect()` was called locally.
    LocalClose,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::RemoteClosed => write!(f, "console closed the connection"),
            DisconnectReason::StreamError(e) => write!(f, "console stream error: {e}"),
            DisconnectReason::LoginRejected => write!(f, "console rejected the login"),
            DisconnectReason::LocalClose => write!(f, "disconnected locally"),
        }
    }
}
