// src/console/session.rs

//! Defines `ConsoleSession`, which owns the TCP connection to the console:
//! connect and login, the paced outbound command queue, and the gated
//! inbound line stream.

use crate::config::ConsoleConfig;
use crate::core::errors::{DisconnectReason, RelayError};
use crate::core::events::{ConsoleEvent, EventBus};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::loops;

/// Lifecycle phases of the console connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    /// Connected; login lines are on the wire, no confirmation seen yet.
    /// Inbound lines are inspected but never emitted in this phase.
    AwaitingLogin,
    /// Login confirmed; inbound lines are emitted.
    Ready,
}

/// State shared between the session handle and its two loops.
#[derive(Debug)]
pub(crate) struct SessionShared {
    pub(crate) status: Mutex<ConnectionStatus>,
    /// A reason recorded by whichever side observed a failure first, taken
    /// by the inbound loop when it terminates. `None` means a plain local
    /// `disconnect()`.
    pub(crate) pending_reason: Mutex<Option<DisconnectReason>>,
    pub(crate) events: EventBus<ConsoleEvent>,
}

/// A handle to one console connection lifetime. Cheap to clone indirectly
/// via `Arc`; all methods take `&self` and are safe to call concurrently
/// with the session's own loops.
#[derive(Debug)]
pub struct ConsoleSession {
    command_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
    shared: Arc<SessionShared>,
    /// A receiver created before the loops start, handed to the first
    /// subscriber so it cannot miss an early `Disconnected`.
    initial_rx: Mutex<Option<broadcast::Receiver<ConsoleEvent>>>,
}

impl ConsoleSession {
    /// Opens a TCP connection to the console with keep-alive enabled and
    /// starts the outbound and inbound loops. The outbound loop waits out
    /// the settle delay (letting the remote banner drain) before writing
    /// `login <username>` and, if non-empty, the password line.
    ///
    /// Connection establishment failures are returned with their cause and
    /// are not retried here.
    pub async fn connect(config: &ConsoleConfig) -> Result<Self, RelayError> {
        let addr_str = format!("{}:{}", config.host, config.port);

        let shared = Arc::new(SessionShared {
            status: Mutex::new(ConnectionStatus::Connecting),
            pending_reason: Mutex::new(None),
            events: EventBus::new(),
        });

        let addr = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| RelayError::ConnectFailed {
                addr: addr_str.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| RelayError::ConnectFailed {
                addr: addr_str.clone(),
                reason: "hostname resolved to no addresses".to_string(),
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(true)?;

        let stream = match timeout(config.connect_timeout, socket.connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                *shared.status.lock() = ConnectionStatus::Disconnected;
                return Err(RelayError::ConnectFailed {
                    addr: addr_str,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                *shared.status.lock() = ConnectionStatus::Disconnected;
                return Err(RelayError::ConnectTimeout(addr_str));
            }
        };

        info!("Connected to console at {}", addr_str);
        *shared.status.lock() = ConnectionStatus::AwaitingLogin;

        let (read_half, write_half) = stream.into_split();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let initial_rx = shared.events.subscribe();

        let mut login_lines = vec![format!("login {}", config.username)];
        if !config.password.is_empty() {
            login_lines.push(config.password.clone());
        }

        tokio::spawn(loops::run_outbound(
            write_half,
            command_rx,
            login_lines,
            config.settle_delay,
            config.pacing_interval,
            shared.clone(),
            cancel.clone(),
        ));
        tokio::spawn(loops::run_inbound(
            read_half,
            config.username.clone(),
            shared.clone(),
            cancel.clone(),
        ));

        Ok(Self {
            command_tx,
            cancel,
            shared,
            initial_rx: Mutex::new(Some(initial_rx)),
        })
    }

    /// Trims `text` and appends it to the outbound FIFO. No-op when the
    /// session is no longer connected. Commands are delivered in enqueue
    /// order with at least the pacing interval between writes.
    pub fn send_command(&self, text: &str) {
        if !self.is_connected() {
            debug!("send_command ignored, session is not connected");
            return;
        }
        // The receiver only closes when the outbound loop has already
        // terminated, at which point dropping the command is correct.
        let _ = self.command_tx.send(text.trim().to_string());
    }

    /// Signals both loops to stop. Queued commands are discarded, not
    /// drained. Idempotent; a `Disconnected` event still fires exactly
    /// once, from the inbound loop's exit path.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Subscribes to this session's lifecycle and line events. The first
    /// call receives events from the moment of connection.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.initial_rx
            .lock()
            .take()
            .unwrap_or_else(|| self.shared.events.subscribe())
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.lock()
    }

    pub fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled() && self.status() != ConnectionStatus::Disconnected
    }
}
