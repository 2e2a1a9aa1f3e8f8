//! WebSocket handler driving one model per connection.
//!
//! Clients connect to `GET /ws`, receive the parameter controls, element
//! layout and initial state, then exchange JSON text frames: the client
//! asks for steps, resets or parameter changes and the server answers with
//! rendered state.

use std::sync::Arc;

use abm_core::Model;
use abm_types::ServerMessage;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use crate::state::{ServerState, Session};

/// Upgrades the request and starts a session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_session<M>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState<M>>>,
) -> impl IntoResponse
where
    M: Model + Send + 'static,
{
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn send_all(socket: &mut WebSocket, messages: Vec<ServerMessage>) -> bool {
    for message in messages {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize server message: {e}");
                continue;
            }
        };
        if socket.send(Message::Text(json.into())).await.is_err() {
            return false;
        }
    }
    true
}

async fn handle_ws<M>(mut socket: WebSocket, state: Arc<ServerState<M>>)
where
    M: Model + Send + 'static,
{
    let (mut session, greeting) = Session::open(state);
    if !send_all(&mut socket, greeting).await {
        debug!(session = %session.id(), "WebSocket client disconnected (send failed)");
        return;
    }

    while let Some(msg) = socket.recv().await {
        let replies = match msg {
            Ok(Message::Text(text)) => session.handle_text(text.as_str()),
            Ok(Message::Ping(data)) => {
                if socket.send(Message::Pong(data)).await.is_err() {
                    debug!(session = %session.id(), "WebSocket client disconnected (pong failed)");
                    return;
                }
                continue;
            }
            Ok(Message::Close(_)) => {
                debug!(session = %session.id(), "WebSocket client disconnected");
                return;
            }
            Ok(_) => continue,
            Err(e) => {
                debug!(session = %session.id(), "WebSocket error: {e}");
                return;
            }
        };
        if !send_all(&mut socket, replies).await {
            debug!(session = %session.id(), "WebSocket client disconnected (send failed)");
            return;
        }
    }
}
