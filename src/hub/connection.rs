// src/hub/connection.rs

//! Handles one remote operator connection: admission, WebSocket handshake,
//! welcome frames, inbound frame dispatch, and cleanup.

use crate::core::events::{EventBus, HubEvent};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::ClientRegistry;

/// Runs a single operator connection to completion.
///
/// Admission is decided before the WebSocket handshake: a duplicate IP
/// drops the raw socket without exchanging any handshake data and without
/// raising events. Registration also happens pre-handshake so the
/// check-then-insert stays atomic against simultaneous connects from the
/// same address.
pub(crate) async fn run_client(
    socket: TcpStream,
    peer: SocketAddr,
    registry: Arc<ClientRegistry>,
    events: Arc<EventBus<HubEvent>>,
    cancel: CancellationToken,
) {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let client = match registry.register(peer.ip(), out_tx) {
        Ok(client) => client,
        Err(e) => {
            info!("Rejected connection from {}: {}", peer, e);
            return;
        }
    };

    let ws = match tokio_tungstenite::accept_async(socket).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", peer, e);
            registry.unregister(client.id);
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();

    // Writer task: the only owner of the sink. All sends, including
    // hub-level fan-out, go through the client's channel.
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    client.send(format!("CONNECTED_ID:{}", client.id));
    client.send(format!("CONNECTED_NICK:{}", client.nickname));
    info!("Operator {} admitted from {}", client.nickname, peer);
    events.publish(HubEvent::ClientConnected(client.nickname.clone()));
    events.publish(HubEvent::RosterChanged(registry.snapshot_nicknames()));

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = stream.next() => item,
        };

        let message = match item {
            None => break,
            Some(Err(e)) => {
                debug!("WebSocket stream from {} errored: {}", peer, e);
                break;
            }
            Some(Ok(message)) => message,
        };

        match message {
            WsMessage::Text(text) => {
                let text = text.as_str();
                if let Some(new_nickname) = text.strip_prefix("NICK:") {
                    if let Some(old) = registry.rename(client.id, new_nickname) {
                        client.send(format!("Nickname changed: {old} -> {new_nickname}"));
                        events.publish(HubEvent::RosterChanged(registry.snapshot_nicknames()));
                    }
                } else if let Some(nickname) = registry.nickname_of(client.id) {
                    events.publish(HubEvent::Message(format!("{} : {}", nickname, text)));
                }
            }
            WsMessage::Close(_) => break,
            // Ping/pong are answered by tungstenite; binary frames carry
            // no meaning in this protocol.
            _ => {}
        }
    }

    if let Some(removed) = registry.unregister(client.id) {
        info!("Operator {} from {} disconnected", removed.nickname, peer);
        events.publish(HubEvent::ClientDisconnected(removed.nickname));
        events.publish(HubEvent::RosterChanged(registry.snapshot_nicknames()));
    }
    writer.abort();
}
