// src/hub/listener.rs

//! The hub's accept loop: takes raw TCP connections and hands each one to
//! a per-client task.

use crate::core::events::{EventBus, HubEvent};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::connection;
use super::registry::ClientRegistry;

/// Accepts operator connections until shutdown. Each connection runs in
/// its own task; a panicking handler never takes the hub down.
pub(crate) async fn run_accept_loop(
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    events: Arc<EventBus<HubEvent>>,
    cancel: CancellationToken,
) {
    let mut client_tasks = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                info!("Hub listener shutting down.");
                break;
            }

            res = listener.accept() => {
                match res {
                    Ok((socket, peer)) => {
                        client_tasks.spawn(connection::run_client(
                            socket,
                            peer,
                            registry.clone(),
                            events.clone(),
                            cancel.clone(),
                        ));
                    }
                    Err(e) => error!("Failed to accept operator connection: {}", e),
                }
            }

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("An operator connection handler panicked: {e:?}");
                }
            }
        }
    }

    client_tasks.shutdown().await;
    info!("All operator connections closed.");
}
