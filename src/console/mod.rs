// src/console/mod.rs

//! Manages the TCP session with the lighting console: login handshake,
//! paced outbound commands, and sanitized, login-gated inbound lines.

mod loops;
mod session;

pub use session::{ConnectionStatus, ConsoleSession};
