//! Outbound messages and the delivery seam the coordinator pushes them through.
//!
//! The coordinator never talks to sockets directly: it builds a [`ServerMessage`] and
//! hands it to a [`BroadcastGateway`], which fans it out to a room's subscribers or
//! delivers it to one connection. [`channels::WsChannels`] is the `WebSocket` adapter.

pub mod channels;

use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::game::{Phase, PlayerStatus, Role, Winner};
use crate::sessions::{ConnectionId, RoomSession};

/// Fan-out and unicast delivery. Sends are fire-and-forget.
pub trait BroadcastGateway: Send + Sync {
    /// Add a connection to a room's channel.
    fn subscribe(&self, room_id: Uuid, connection_id: &ConnectionId);
    /// Remove a connection from a room's channel.
    fn unsubscribe(&self, room_id: Uuid, connection_id: &ConnectionId);
    /// Deliver to every subscriber of the room's channel.
    fn broadcast(&self, room_id: Uuid, message: &ServerMessage);
    /// Deliver to a single connection only.
    fn unicast(&self, connection_id: &ConnectionId, message: &ServerMessage);
}

/// What the transport remembers about a connection once it has joined a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttributes {
    pub room_id: Uuid,
    pub player_id: Uuid,
    pub username: String,
}

/// Per-connection attribute storage, used by the disconnect path.
pub trait AttributeStore: Send + Sync {
    fn stash(&self, connection_id: &ConnectionId, attributes: ConnectionAttributes);
    fn attributes(&self, connection_id: &ConnectionId) -> Option<ConnectionAttributes>;
    fn clear(&self, connection_id: &ConnectionId) -> Option<ConnectionAttributes>;
}

/// Every message the server sends, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Presence and game state of a room, sent to the whole room.
    RoomStateUpdate(RoomSnapshot),
    /// Join acknowledgement, sent to the joining connection.
    Joined {
        room_id: Uuid,
        player_id: Uuid,
        connection_id: ConnectionId,
        is_host: bool,
    },
    /// A player's own role, sent only to that player.
    RoleAssigned { room_id: Uuid, role: Role },
    /// Investigation result, sent only to the seer.
    SeerResult { target_id: Uuid, role: Role },
    /// The room was removed; subscribers are dropped after this.
    RoomClosed { room_id: Uuid },
    /// Operation failure, sent only to the requesting connection.
    Error { code: String, message: String },
}

impl ServerMessage {
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// One player as seen by the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: Uuid,
    pub username: String,
    pub is_host: bool,
    pub status: PlayerStatus,
    /// Only filled once the game is over.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Room-wide state pushed after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: Uuid,
    pub room_name: String,
    pub players: Vec<PlayerView>,
    pub host_username: Option<String>,
    pub player_count: usize,
    pub phase: Phase,
    pub day_number: u32,
    pub time_remaining: Option<u64>,
    pub last_event: Option<String>,
    pub winner: Option<Winner>,
    pub votes_cast: usize,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl RoomSnapshot {
    /// Capture the room as every member may see it.
    ///
    /// Roles stay hidden until `GameOver`; players learn their own role through
    /// [`ServerMessage::RoleAssigned`].
    #[must_use]
    pub fn capture(session: &RoomSession, now: Instant) -> Self {
        let reveal = session.phase() == Phase::GameOver;
        let players = session
            .players_in_join_order()
            .into_iter()
            .map(|p| PlayerView {
                player_id: p.player_id,
                username: p.username.clone(),
                is_host: session.is_host(&p.connection_id),
                status: p.status,
                role: if reveal { p.role } else { None },
            })
            .collect::<Vec<_>>();

        let game = session.game();
        Self {
            room_id: session.room_id(),
            room_name: session.room_name().to_string(),
            player_count: players.len(),
            players,
            host_username: session.host_player().map(|p| p.username.clone()),
            phase: game.phase,
            day_number: game.day_number,
            time_remaining: game.time_remaining(now),
            last_event: game.last_event.clone(),
            winner: game.winner,
            votes_cast: game.votes.len(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
