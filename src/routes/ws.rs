use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::broadcast::{BroadcastGateway, ConnectionAttributes, ServerMessage};
use crate::coordinator::CoordinatorError;
use crate::game::NightAction;
use crate::sessions::ConnectionId;
use crate::state::AppState;

/// Build the `WebSocket` route: `/ws`
pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

/// Messages a client may send, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
enum ClientMessage {
    Join {
        room_id: Uuid,
        player_id: Uuid,
        username: String,
    },
    Leave,
    Heartbeat,
    StartGame,
    Vote {
        target_id: Uuid,
    },
    NightAction {
        target_id: Uuid,
        action: String,
    },
}

/// `GET /api/v1/ws`: upgrade to `WebSocket`. Room membership is negotiated with `JOIN`.
async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(state, socket))
}

/// Drive one socket: outbound channel relay plus the inbound message loop.
async fn handle_ws_connection(state: AppState, socket: WebSocket) {
    let connection_id = ConnectionId::generate();
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    state.channels.register(connection_id.clone(), tx);
    tracing::debug!(%connection_id, "WebSocket connected");

    // Forward outbound messages to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sink.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                handle_ws_message(&state, &connection_id, text.as_str()).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Cleanup on disconnect
    send_task.abort();
    state.coordinator.on_disconnect(&connection_id).await;
    state.channels.unregister(&connection_id);
    tracing::debug!(%connection_id, "WebSocket disconnected");
}

/// Route an inbound message and report failures to the sender only.
async fn handle_ws_message(state: &AppState, connection_id: &ConnectionId, text: &str) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            send_error(state, connection_id, "BAD_REQUEST", format!("Malformed message: {e}"));
            return;
        }
    };

    if let Err(err) = dispatch(state, connection_id, message).await {
        match &err {
            WsError::Coordinator(CoordinatorError::Directory(e)) => {
                tracing::error!(%connection_id, error = %e, "Room lookup failed");
                send_error(state, connection_id, "INTERNAL_ERROR", "An internal error occurred");
            }
            WsError::Coordinator(e) => send_error(state, connection_id, e.code(), e.to_string()),
            WsError::NotJoined => {
                send_error(state, connection_id, "NOT_JOINED", "Join a room first");
            }
            WsError::BadRequest(reason) => {
                send_error(state, connection_id, "BAD_REQUEST", reason.clone());
            }
        }
    }
}

enum WsError {
    Coordinator(CoordinatorError),
    NotJoined,
    BadRequest(String),
}

impl From<CoordinatorError> for WsError {
    fn from(err: CoordinatorError) -> Self {
        Self::Coordinator(err)
    }
}

async fn dispatch(
    state: &AppState,
    connection_id: &ConnectionId,
    message: ClientMessage,
) -> Result<(), WsError> {
    let coordinator = &state.coordinator;
    match message {
        ClientMessage::Join {
            room_id,
            player_id,
            username,
        } => {
            coordinator
                .on_join(room_id, connection_id.clone(), player_id, &username)
                .await?;
        }
        ClientMessage::Leave => {
            let joined = joined(state, connection_id)?;
            coordinator.on_leave(joined.room_id, connection_id).await;
        }
        ClientMessage::Heartbeat => {
            let joined = joined(state, connection_id)?;
            coordinator.on_heartbeat(joined.room_id, connection_id).await;
        }
        ClientMessage::StartGame => {
            let joined = joined(state, connection_id)?;
            coordinator
                .start_game_by(joined.room_id, connection_id)
                .await?;
        }
        ClientMessage::Vote { target_id } => {
            let joined = joined(state, connection_id)?;
            coordinator
                .vote(joined.room_id, joined.player_id, target_id)
                .await?;
        }
        ClientMessage::NightAction { target_id, action } => {
            let joined = joined(state, connection_id)?;
            let action = action
                .parse::<NightAction>()
                .map_err(WsError::BadRequest)?;
            coordinator
                .night_action(joined.room_id, joined.player_id, target_id, action)
                .await?;
        }
    }
    Ok(())
}

/// The room membership stashed for this connection; game actions act as this player.
fn joined(state: &AppState, connection_id: &ConnectionId) -> Result<ConnectionAttributes, WsError> {
    state
        .coordinator
        .attributes_of(connection_id)
        .ok_or(WsError::NotJoined)
}

fn send_error(
    state: &AppState,
    connection_id: &ConnectionId,
    code: &str,
    message: impl Into<String>,
) {
    state
        .channels
        .unicast(connection_id, &ServerMessage::error(code, message));
}
