use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{PlayerStatus, Role};

/// Opaque handle for one live transport connection.
///
/// Distinct from the player's stable identity: a reconnecting player gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Allocate a fresh random connection id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One connected player within one room session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerPresence {
    pub connection_id: ConnectionId,
    pub player_id: Uuid,
    pub username: String,
    pub role: Option<Role>,
    pub status: PlayerStatus,
    pub joined_at: Instant,
    pub last_heartbeat: Instant,
}

impl PlayerPresence {
    #[must_use]
    pub const fn new(
        connection_id: ConnectionId,
        player_id: Uuid,
        username: String,
        now: Instant,
    ) -> Self {
        Self {
            connection_id,
            player_id,
            username,
            role: None,
            status: PlayerStatus::Alive,
            joined_at: now,
            last_heartbeat: now,
        }
    }

    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }

    /// Whether this player holds a role in the current game.
    #[must_use]
    pub const fn is_participant(&self) -> bool {
        self.role.is_some()
    }
}
