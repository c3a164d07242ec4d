// src/core/mod.rs

//! Core building blocks shared by the console session and the client hub.

pub mod errors;
pub mod events;
pub mod netutil;
pub mod sanitize;

pub use errors::{DisconnectReason, RelayError};
pub use events::{ConsoleEvent, EventBus, HubEvent};
