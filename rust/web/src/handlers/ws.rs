use crate::errors::IntoErrorResponse;
use crate::events::EventSubscription;
use crate::protocol::ServerMessage;
use crate::registry::{JoinError, RoomRegistry};
use crate::session::{GameSession, SessionError};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use warp::reply::Response;
use warp::ws::{Message, WebSocket, Ws};
use warp::Reply;

/// Admission checks that can be answered before the upgrade: a username must
/// be present and the room must exist in the directory.
pub fn upgrade(
    registry: Arc<RoomRegistry>,
    room_code: String,
    query: HashMap<String, String>,
    ws: Ws,
) -> Response {
    let username = match query.get("username").map(|name| name.trim()) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return JoinError::MissingUsername.into_http_response(),
    };

    match registry.validate_room(&room_code) {
        Ok(true) => {}
        Ok(false) => return JoinError::RoomNotFound(room_code).into_http_response(),
        Err(err) => return JoinError::from(err).into_http_response(),
    }

    ws.on_upgrade(move |socket| run(registry, room_code, username, socket))
        .into_response()
}

/// Drives one upgraded socket until either side goes away.
pub async fn run(
    registry: Arc<RoomRegistry>,
    room_code: String,
    username: String,
    mut socket: WebSocket,
) {
    let (session, subscription) =
        match GameSession::establish(Arc::clone(&registry), &room_code, &username) {
            Ok(admitted) => admitted,
            Err(err) => {
                tracing::info!(
                    room_code = %room_code,
                    username = %username,
                    reason = %err,
                    "closing socket refused by room"
                );
                let _ = socket.close().await;
                return;
            }
        };

    let (ws_tx, mut ws_rx) = socket.split();
    let writer = tokio::spawn(forward_outbound(subscription, ws_tx));

    while let Some(frame) = ws_rx.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                tracing::debug!(
                    room_code = %room_code,
                    connection_id = %session.connection_id(),
                    error = %err,
                    "socket read failed"
                );
                break;
            }
        };
        if message.is_close() {
            break;
        }
        let Ok(text) = message.to_str() else {
            continue;
        };

        match session.handle_text(text) {
            Ok(()) => {}
            Err(SessionError::Unrecognized) => tracing::debug!(
                room_code = %room_code,
                connection_id = %session.connection_id(),
                "ignoring unrecognized frame"
            ),
            Err(SessionError::Rejected(err)) => tracing::debug!(
                room_code = %room_code,
                connection_id = %session.connection_id(),
                reason = %err,
                "action rejected"
            ),
        }
    }

    if let Err(err) = session.leave() {
        tracing::warn!(room_code = %room_code, error = %err, "failed to leave room");
    }
    writer.abort();
}

async fn forward_outbound(
    subscription: EventSubscription,
    ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
) {
    let (membership, receiver) = subscription.into_parts();
    let connection_id = membership.connection_id();

    let outbound = ReceiverStream::new(receiver).filter_map(|message| async move {
        render(&message).map(|text| Ok::<_, warp::Error>(Message::text(text)))
    });

    if let Err(err) = outbound.forward(ws_tx).await {
        tracing::debug!(connection_id = %connection_id, error = %err, "socket write failed");
    }
    drop(membership);
}

fn render(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize server message");
            None
        }
    }
}
