//! WebSocket protocol: `subscribe`/`start_stream`/`stop_stream`, each
//! carrying `{sessionId}`. One socket may subscribe to at most one
//! session's room at a time; the fabric's own broadcast channel is the
//! only fan-out point, so this handler just bridges it to the socket.
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use engine_core_types::SessionId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use super::state::ServeState;

pub(crate) fn router() -> Router<ServeState> {
    Router::new().route("/ws", get(upgrade_handler))
}

async fn upgrade_handler(ws: WebSocketUpgrade, State(state): State<ServeState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { #[serde(rename = "sessionId")] session_id: String },
    StartStream { #[serde(rename = "sessionId")] session_id: String },
    StopStream { #[serde(rename = "sessionId")] session_id: String },
}

async fn handle_socket(socket: WebSocket, state: ServeState) {
    let (sink, mut stream) = socket.split();
    let sink = Arc::new(AsyncMutex::new(sink));
    let mut subscription: Option<tokio::task::JoinHandle<()>> = None;

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let reply = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Subscribe { session_id }) => {
                if let Some(handle) = subscription.take() {
                    handle.abort();
                }
                subscription = Some(spawn_forwarder(state.fabric.clone(), SessionId(session_id), sink.clone()));
                continue;
            }
            Ok(ClientMessage::StartStream { session_id }) => {
                let started = state.engine.start_stream(&SessionId(session_id.clone()));
                json!({ "event": "stream_ack", "sessionId": session_id, "started": started })
            }
            Ok(ClientMessage::StopStream { session_id }) => {
                let stopped = state.engine.stop_stream(&SessionId(session_id.clone())).await;
                json!({ "event": "stream_ack", "sessionId": session_id, "stopped": stopped })
            }
            Err(err) => json!({ "event": "stream_error", "message": err.to_string() }),
        };

        if sink.lock().await.send(Message::Text(reply.to_string())).await.is_err() {
            break;
        }
    }

    if let Some(handle) = subscription {
        handle.abort();
    }
}

/// One task per active subscription, draining the fabric's broadcast
/// receiver into the shared sink until the receiver lags/closes or the
/// socket write fails.
fn spawn_forwarder(
    fabric: notify_fabric::NotificationFabric,
    session_id: SessionId,
    sink: Arc<AsyncMutex<futures_util::stream::SplitSink<WebSocket, Message>>>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut receiver = fabric.subscribe(&session_id);
        while let Ok(notification) = receiver.recv().await {
            let payload = json!({
                "event": notification.event,
                "sessionId": notification.session_id.0,
                "seq": notification.seq,
                "payload": notification.payload,
            });
            if sink.lock().await.send(Message::Text(payload.to_string())).await.is_err() {
                break;
            }
        }
        fabric.vacuum(&session_id);
    })
}
