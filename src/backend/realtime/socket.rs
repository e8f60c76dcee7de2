/**
 * Live WebSocket Handler
 *
 * Implements the `/live` endpoint: a persistent, bidirectional connection
 * over which clients join and leave rooms and receive pushed notifications.
 *
 * # Client Operations
 *
 * ```json
 * {"op":"join","room":"64f0c2..."}
 * {"op":"leave","room":"64f0c2..."}
 * ```
 *
 * Closing the socket leaves every room.
 *
 * # Connection Management
 *
 * Each connection is split into a reader task (client commands) and a writer
 * task (queued notifications plus error replies). When either side ends the
 * other is aborted and the subscriber is removed from the registry. When the
 * registry drops the subscriber (shutdown or broken delivery) the writer sees
 * its queue close and sends a close frame.
 */

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::backend::realtime::registry::{ChannelRegistry, SubscriberId};
use crate::shared::{ClientCommand, RealtimeEvent, SharedError};

/// Error replies buffered for one connection
const REPLY_QUEUE_CAPACITY: usize = 8;

/// Handle a live subscription (GET /live)
pub async fn handle_live_socket(
    State(registry): State<ChannelRegistry>,
    ws: WebSocketUpgrade,
) -> Response {
    tracing::info!("[Realtime] Live connection upgrade requested");
    ws.on_upgrade(move |socket| serve_subscriber(socket, registry))
}

/// Decode one client frame
pub fn parse_command(text: &str) -> Result<ClientCommand, SharedError> {
    serde_json::from_str(text)
        .map_err(|e| SharedError::protocol(format!("invalid command: {}", e)))
}

/// Apply a client command to the registry
///
/// Returns false when the registry ignored the command.
pub async fn apply_command(registry: &ChannelRegistry, id: SubscriberId, command: ClientCommand) -> bool {
    match command {
        ClientCommand::Join { room } => {
            let joined = registry.join(id, room.clone()).await;
            if joined {
                tracing::info!("[Realtime] Subscriber {} joined room {}", id, room);
            } else {
                tracing::debug!("[Realtime] Subscriber {} not registered, ignoring join of {}", id, room);
            }
            joined
        }
        ClientCommand::Leave { room } => {
            let left = registry.leave(id, &room).await;
            if left {
                tracing::info!("[Realtime] Subscriber {} left room {}", id, room);
            }
            left
        }
    }
}

async fn serve_subscriber(mut socket: WebSocket, registry: ChannelRegistry) {
    let Some((id, mut notifications)) = registry.register().await else {
        tracing::warn!("[Realtime] Registry closed, rejecting connection");
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    tracing::info!("[Realtime] Subscriber {} connected", id);

    let (mut sink, mut stream) = socket.split();
    let (reply_tx, mut replies) = mpsc::channel::<RealtimeEvent>(REPLY_QUEUE_CAPACITY);

    let mut writer = tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = notifications.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                Some(reply) = replies.recv() => reply,
            };

            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("[Realtime] Dropping {} frame: {}", event.event, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    let reader_registry = registry.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => match parse_command(text.as_str()) {
                    Ok(command) => {
                        apply_command(&reader_registry, id, command).await;
                    }
                    Err(e) => {
                        tracing::debug!("[Realtime] Subscriber {} sent bad frame: {}", id, e);
                        let _ = reply_tx.try_send(RealtimeEvent::error(e.to_string()));
                    }
                },
                Ok(Message::Binary(_)) => {
                    let _ = reply_tx.try_send(RealtimeEvent::error("binary frames are not supported"));
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("[Realtime] Subscriber {} read error: {}", id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    registry.remove_subscriber(id).await;
    tracing::info!("[Realtime] Subscriber {} disconnected", id);
}
