// src/core/events.rs

//! Defines the event buses that carry lifecycle and data events from the
//! console session and the client hub to the owning application.
//!
//! The original design used registered callbacks for these notifications;
//! broadcast channels keep the core free of any assumption about which
//! thread or task consumes them.

use crate::core::errors::DisconnectReason;
use tokio::sync::broadcast::{self, Sender as BroadcastSender};
use tracing::debug;

/// The capacity of each event bus. Sized to absorb bursts of console
/// output without lagging a slow subscriber.
const EVENT_BUS_CAPACITY: usize = 1024;

/// Events produced by a console session.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    /// One sanitized, non-blank line received after login was confirmed.
    Line(String),
    /// The session ended. Fired exactly once per connection lifetime.
    Disconnected(DisconnectReason),
}

/// Events produced by the client hub.
#[derive(Debug, Clone)]
pub enum HubEvent {
    /// A new operator was admitted, identified by its assigned nickname.
    ClientConnected(String),
    /// An operator's transport closed.
    ClientDisconnected(String),
    /// The roster changed; carries a full nickname snapshot in admission order.
    RosterChanged(Vec<String>),
    /// An operator sent a command frame, pre-formatted as `<nickname> : <text>`.
    Message(String),
}

/// A broadcast bus for one event type. Publishing never fails: an event
/// with no live subscriber is dropped, which is normal during startup
/// and shutdown.
#[derive(Debug)]
pub struct EventBus<T: Clone> {
    sender: BroadcastSender<T>,
}

impl<T: Clone + std::fmt::Debug> EventBus<T> {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    pub fn publish(&self, event: T) {
        if self.sender.send(event).is_err() {
            debug!("Published an event with no active subscribers.");
        }
    }

    /// Provides a new receiver subscribed to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }
}

impl<T: Clone + std::fmt::Debug> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
