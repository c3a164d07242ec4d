// src/server/mod.rs

//! The owning application: connects the console session, starts the hub,
//! and bridges events between them. The core components never call each
//! other; all coupling lives here.

use crate::config::Config;
use crate::console::ConsoleSession;
use crate::core::events::{ConsoleEvent, HubEvent};
use crate::core::netutil;
use crate::hub::Hub;
use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Runs the relay until the console disconnects or a termination signal
/// arrives.
pub async fn run(config: Config) -> Result<()> {
    let hub = Hub::start(config.hub.port).await?;

    if let Some(ip) = netutil::local_ipv4() {
        info!(
            "Operator join URL: {}",
            netutil::join_url(ip, hub.local_addr().port())
        );
    } else {
        warn!("Could not determine a local IPv4 address for the join URL.");
    }

    let session = match ConsoleSession::connect(&config.console).await {
        Ok(session) => session,
        Err(e) => {
            hub.shutdown();
            return Err(e.into());
        }
    };

    let mut console_events = session.subscribe();
    let mut hub_events = hub.subscribe();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            event = console_events.recv() => match event {
                Ok(ConsoleEvent::Line(line)) => hub.send_to_all(&line),
                Ok(ConsoleEvent::Disconnected(reason)) => {
                    error!("Console session ended: {}", reason);
                    hub.send_to_all(&format!("Console disconnected: {reason}"));
                    break;
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Dropped {} console lines; operators fell behind.", n);
                }
                Err(RecvError::Closed) => break,
            },

            event = hub_events.recv() => match event {
                Ok(HubEvent::Message(formatted)) => {
                    info!("Operator command: {}", formatted);
                    // The hub tags frames as "<nickname> : <command>";
                    // the console gets only the command part.
                    if let Some((_, command)) = formatted.split_once(" : ") {
                        session.send_command(command);
                    }
                }
                Ok(HubEvent::ClientConnected(nickname)) => {
                    info!("Operator connected: {}", nickname);
                }
                Ok(HubEvent::ClientDisconnected(nickname)) => {
                    info!("Operator disconnected: {}", nickname);
                }
                Ok(HubEvent::RosterChanged(roster)) => {
                    info!("Operator roster: {:?}", roster);
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Dropped {} hub events.", n);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.disconnect();
    hub.shutdown();
    info!("Relay shutdown complete.");
    Ok(())
}
