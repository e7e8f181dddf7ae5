//! Live-connection handling: identify, join rooms, forward room events.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt, stream::SelectAll};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientInboundMessage, IdentifyAck},
    state::{
        SharedState,
        rooms::{group_room, user_room},
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of one WebSocket connection.
///
/// The first frame must be an `identify` message; the connection is then
/// joined to its user room and every group room the store knows the user to be
/// in, and from there on only receives forwarded room events.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound events flowing even while we await
    // inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let user_id = match serde_json::from_str::<ClientInboundMessage>(&initial_message) {
        Ok(ClientInboundMessage::Identify { user_id }) => user_id,
        Ok(ClientInboundMessage::Unknown) => {
            warn!("first websocket message was not an identification");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse websocket message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let rooms = rooms_for_user(&state, user_id).await;
    let mut events: SelectAll<BroadcastStream<_>> = SelectAll::new();
    for room in &rooms {
        events.push(BroadcastStream::new(state.rooms().join(room)));
    }

    info!(user_id = %user_id, rooms = rooms.len(), "websocket client identified");
    if send_json(&outbound_tx, &IdentifyAck { user_id, rooms }).is_err() {
        finalize(writer_task, outbound_tx).await;
        return;
    }

    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientInboundMessage>(&text) {
                        Ok(ClientInboundMessage::Identify { .. }) => {
                            warn!(user_id = %user_id, "ignoring duplicate identification");
                        }
                        Ok(ClientInboundMessage::Unknown) => {
                            warn!(user_id = %user_id, "ignoring unknown websocket message");
                        }
                        Err(err) => {
                            warn!(user_id = %user_id, error = %err, "failed to parse websocket message");
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = outbound_tx.send(Message::Pong(payload));
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = outbound_tx.send(Message::Close(frame));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(user_id = %user_id, error = %err, "websocket error");
                    break;
                }
                None => break,
            },
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if send_json(&outbound_tx, &event).is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(user_id = %user_id, skipped, "websocket client lagged behind room events");
                }
                None => break,
            },
        }
    }

    info!(user_id = %user_id, "websocket client disconnected");
    finalize(writer_task, outbound_tx).await;
}

/// Rooms a freshly identified connection joins: the user's own room plus one
/// per group membership. Group lookups degrade to the user room alone when the
/// store is unreachable.
async fn rooms_for_user(state: &SharedState, user_id: Uuid) -> Vec<String> {
    let mut rooms = vec![user_room(user_id)];
    match state.store().await {
        Some(store) => match store.groups_for_member(user_id).await {
            Ok(group_ids) => rooms.extend(group_ids.into_iter().map(group_room)),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to resolve group rooms");
            }
        },
        None => warn!(user_id = %user_id, "storage unavailable, joining user room only"),
    }
    rooms
}

/// Serialize a payload and queue it on the writer. `Err` means the writer is
/// gone and the connection should wind down; serialization failures are logged
/// and swallowed.
fn send_json<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), ()>
where
    T: ?Sized + serde::Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize websocket payload");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into())).map_err(|_| ())
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
