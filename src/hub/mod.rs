// src/hub/mod.rs

//! The WebSocket-facing hub: operator admission, identity, and message
//! fan-out. The hub never talks to the console itself; it only raises
//! events and exposes targeted/broadcast send.

mod connection;
mod listener;
mod registry;

pub use registry::{ClientId, ClientRegistry, RemoteClient};

use crate::core::errors::RelayError;
use crate::core::events::{EventBus, HubEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A running WebSocket hub. Dropping the handle does not stop the hub;
/// call [`Hub::shutdown`].
#[derive(Debug)]
pub struct Hub {
    registry: Arc<ClientRegistry>,
    events: Arc<EventBus<HubEvent>>,
    cancel: CancellationToken,
    local_addr: SocketAddr,
}

impl Hub {
    /// Binds the WebSocket listener on all interfaces and starts the
    /// accept loop. A bind failure is returned as an error and not
    /// retried.
    pub async fn start(port: u16) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| RelayError::BindFailed {
                port,
                reason: e.to_string(),
            })?;
        let local_addr = listener.local_addr()?;
        info!("Hub listening for operators on ws://{}", local_addr);

        let registry = Arc::new(ClientRegistry::new());
        let events = Arc::new(EventBus::new());
        let cancel = CancellationToken::new();

        tokio::spawn(listener::run_accept_loop(
            listener,
            registry.clone(),
            events.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            registry,
            events,
            cancel,
            local_addr,
        })
    }

    /// Subscribes to admission, disconnection, roster, and message events.
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Sends to the first client whose current nickname matches, if its
    /// transport is available. Silently does nothing otherwise.
    pub fn send_to_nickname(&self, nickname: &str, message: &str) {
        if let Some(client) = self.registry.lookup_by_nickname(nickname) {
            client.send(message);
        }
    }

    /// Best-effort send to every available client. A failed send to one
    /// client does not abort the others and is not retried.
    pub fn send_to_all(&self, message: &str) {
        for client in self.registry.snapshot_clients() {
            client.send(message);
        }
    }

    /// A consistent snapshot of current nicknames, in admission order.
    pub fn nicknames(&self) -> Vec<String> {
        self.registry.snapshot_nicknames()
    }

    /// The bound listener address; useful when started with port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the accept loop and all operator connections. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
