// src/console/loops.rs

//! The two independent loops of a console session: the paced outbound
//! writer and the gated inbound reader. Both terminate through the one
//! cancellation token tied to the socket lifetime.

use crate::core::errors::DisconnectReason;
use crate::core::events::ConsoleEvent;
use crate::core::sanitize;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{ConnectionStatus, SessionShared};

/// Writes login lines after the settle delay, then drains the command
/// queue in FIFO order with the pacing interval between writes. On
/// cancellation the loop exits immediately; queued commands are discarded.
pub(crate) async fn run_outbound(
    write_half: OwnedWriteHalf,
    mut command_rx: mpsc::UnboundedReceiver<String>,
    login_lines: Vec<String>,
    settle_delay: Duration,
    pacing_interval: Duration,
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
) {
    let mut sink = FramedWrite::new(write_half, LinesCodec::new());

    // Let the console's banner and prompt drain before logging in.
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        _ = sleep(settle_delay) => {}
    }

    for line in login_lines {
        if let Err(e) = sink.send(line).await {
            record_write_failure(&shared, &cancel, e);
            return;
        }
    }

    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            cmd = command_rx.recv() => match cmd {
                Some(cmd) => cmd,
                None => break,
            },
        };

        debug!("Sending command to console: {}", command);
        if let Err(e) = sink.send(command).await {
            record_write_failure(&shared, &cancel, e);
            break;
        }

        // Pace consecutive writes so the console's line parser keeps up.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = sleep(pacing_interval) => {}
        }
    }
}

fn record_write_failure(
    shared: &SessionShared,
    cancel: &CancellationToken,
    e: tokio_util::codec::LinesCodecError,
) {
    warn!("Write to console failed: {}", e);
    shared
        .pending_reason
        .lock()
        .get_or_insert(DisconnectReason::StreamError(e.to_string()));
    cancel.cancel();
}

/// Reads console lines until the stream ends, a read fails, the login is
/// rejected, or the session is cancelled. Blank lines (raw or after
/// sanitizing) are discarded. Before confirmation, lines are inspected
/// only for the login phrases; once confirmed, every cleaned line is
/// emitted, including the confirming line itself.
///
/// This loop owns session teardown: it resets the status, cancels the
/// token, and publishes `Disconnected` exactly once.
pub(crate) async fn run_inbound(
    read_half: OwnedReadHalf,
    username: String,
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
) {
    let confirmation = format!("Logged in as User '{username}'");
    let mut lines = FramedRead::new(read_half, LinesCodec::new());
    let mut confirmed = false;

    let reason = loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break local_close_reason(&shared),
            item = lines.next() => item,
        };

        let raw = match item {
            None => break DisconnectReason::RemoteClosed,
            Some(Err(e)) => break DisconnectReason::StreamError(e.to_string()),
            Some(Ok(raw)) => raw,
        };

        if raw.trim().is_empty() {
            continue;
        }
        let cleaned = sanitize::clean(&raw);
        if cleaned.trim().is_empty() {
            continue;
        }

        if !confirmed {
            if cleaned.contains(&confirmation) {
                confirmed = true;
                *shared.status.lock() = ConnectionStatus::Ready;
                info!("Console login confirmed for user '{}'", username);
            } else if cleaned.contains("Login failed") {
                break DisconnectReason::LoginRejected;
            }
        }

        if confirmed {
            shared.events.publish(ConsoleEvent::Line(cleaned));
        }
    };

    info!("Console session ended: {}", reason);
    *shared.status.lock() = ConnectionStatus::Disconnected;
    cancel.cancel();
    shared.events.publish(ConsoleEvent::Disconnected(reason));
}

/// A cancelled read usually means a local `disconnect()`, unless the
/// outbound loop recorded a write failure first.
fn local_close_reason(shared: &SessionShared) -> DisconnectReason {
    shared
        .pending_reason
        .lock()
        .take()
        .unwrap_or(DisconnectReason::LocalClose)
}
