use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use super::presence::{ConnectionId, PlayerPresence};
use crate::game::{GameState, Phase};

/// Result of [`RoomSession::add_player`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// New presence record created.
    Joined { is_host: bool },
    /// Same connection joined again; only the heartbeat was refreshed.
    Refreshed,
    /// Known player on a new connection; the record moved from `previous`.
    Reconnected { previous: ConnectionId },
}

/// Result of [`RoomSession::remove_player`].
#[derive(Debug, Clone)]
pub struct Departure {
    pub player: PlayerPresence,
    /// Connection promoted to host by this removal, if any.
    pub new_host: Option<ConnectionId>,
    /// The session has no players left and is now closed.
    pub emptied: bool,
}

/// Live state of one room.
///
/// A session is only ever touched through its owning mutex in the
/// [`SessionRegistry`](super::SessionRegistry), so plain collections are enough here.
#[derive(Debug)]
pub struct RoomSession {
    pub(crate) room_id: Uuid,
    pub(crate) room_name: String,
    pub(crate) players: HashMap<ConnectionId, PlayerPresence>,
    pub(crate) host: Option<ConnectionId>,
    pub(crate) game: GameState,
    pub(crate) created_at: Instant,
    pub(crate) last_activity: Instant,
    closed: bool,
}

impl RoomSession {
    #[must_use]
    pub fn new(room_id: Uuid, room_name: String, now: Instant) -> Self {
        Self {
            room_id,
            room_name,
            players: HashMap::new(),
            host: None,
            game: GameState::default(),
            created_at: now,
            last_activity: now,
            closed: false,
        }
    }

    #[must_use]
    pub const fn room_id(&self) -> Uuid {
        self.room_id
    }

    #[must_use]
    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.game.phase
    }

    #[must_use]
    pub const fn game(&self) -> &GameState {
        &self.game
    }

    #[must_use]
    pub const fn host(&self) -> Option<&ConnectionId> {
        self.host.as_ref()
    }

    #[must_use]
    pub fn host_player(&self) -> Option<&PlayerPresence> {
        self.host.as_ref().and_then(|host| self.players.get(host))
    }

    #[must_use]
    pub fn is_host(&self, connection_id: &ConnectionId) -> bool {
        self.host.as_ref() == Some(connection_id)
    }

    #[must_use]
    pub fn player(&self, connection_id: &ConnectionId) -> Option<&PlayerPresence> {
        self.players.get(connection_id)
    }

    #[must_use]
    pub fn player_by_id(&self, player_id: Uuid) -> Option<&PlayerPresence> {
        self.players.values().find(|p| p.player_id == player_id)
    }

    pub(crate) fn player_by_id_mut(&mut self, player_id: Uuid) -> Option<&mut PlayerPresence> {
        self.players.values_mut().find(|p| p.player_id == player_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerPresence> {
        self.players.values()
    }

    /// Players ordered by join time, ties broken by connection id.
    #[must_use]
    pub fn players_in_join_order(&self) -> Vec<&PlayerPresence> {
        let mut players: Vec<_> = self.players.values().collect();
        players.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.connection_id.cmp(&b.connection_id))
        });
        players
    }

    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub const fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Mark the session dead. Joiners holding a stale handle must fetch a fresh one.
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.host = None;
    }

    /// Whether a join would fit under `max_players`.
    ///
    /// Refreshes and reconnects never add a record, so they always fit.
    #[must_use]
    pub fn admits(&self, connection_id: &ConnectionId, player_id: Uuid, max_players: usize) -> bool {
        self.players.contains_key(connection_id)
            || self.player_by_id(player_id).is_some()
            || self.players.len() < max_players
    }

    /// Add or refresh a player.
    ///
    /// The first player to join an empty session becomes host.
    pub fn add_player(
        &mut self,
        connection_id: ConnectionId,
        player_id: Uuid,
        username: String,
        now: Instant,
    ) -> JoinOutcome {
        self.last_activity = now;

        if let Some(existing) = self.players.get_mut(&connection_id) {
            existing.last_heartbeat = now;
            return JoinOutcome::Refreshed;
        }

        let previous = self
            .player_by_id(player_id)
            .map(|p| p.connection_id.clone());
        if let Some(previous) = previous
            && let Some(mut record) = self.players.remove(&previous)
        {
            record.connection_id = connection_id.clone();
            record.username = username;
            record.last_heartbeat = now;
            self.players.insert(connection_id.clone(), record);
            if self.host.as_ref() == Some(&previous) {
                self.host = Some(connection_id);
            }
            return JoinOutcome::Reconnected { previous };
        }

        let is_host = self.host.is_none();
        if is_host {
            self.host = Some(connection_id.clone());
        }
        self.players.insert(
            connection_id.clone(),
            PlayerPresence::new(connection_id, player_id, username, now),
        );
        JoinOutcome::Joined { is_host }
    }

    /// Remove a player, re-electing the host if needed.
    ///
    /// Returns `None` when the connection is not in the room.
    pub fn remove_player(&mut self, connection_id: &ConnectionId) -> Option<Departure> {
        let player = self.players.remove(connection_id)?;
        self.last_activity = Instant::now();

        let departed = player.player_id;
        self.game.votes.remove(&departed);
        self.game.votes.retain(|_, target| *target != departed);

        let mut new_host = None;
        if self.host.as_ref() == Some(connection_id) {
            self.host = self.elect_host();
            new_host.clone_from(&self.host);
        }

        let emptied = self.players.is_empty();
        if emptied {
            self.close();
        }

        Some(Departure {
            player,
            new_host,
            emptied,
        })
    }

    /// Refresh a connection's heartbeat. Returns `false` if it is not in the room.
    pub fn update_heartbeat(&mut self, connection_id: &ConnectionId, now: Instant) -> bool {
        let Some(player) = self.players.get_mut(connection_id) else {
            return false;
        };
        player.last_heartbeat = now;
        self.last_activity = now;
        true
    }

    /// Connections whose last heartbeat is older than `cutoff`.
    #[must_use]
    pub fn stale_connections(&self, cutoff: Instant) -> Vec<ConnectionId> {
        self.players
            .values()
            .filter(|p| p.last_heartbeat < cutoff)
            .map(|p| p.connection_id.clone())
            .collect()
    }

    /// Repair a missing or dangling host pointer. Returns `true` if a repair happened.
    ///
    /// This can only trip through a bug in the join/leave paths.
    pub fn ensure_host(&mut self) -> bool {
        if self.players.is_empty() {
            return false;
        }
        let valid = self
            .host
            .as_ref()
            .is_some_and(|host| self.players.contains_key(host));
        debug_assert!(valid, "host pointer out of sync in room {}", self.room_id);
        if valid {
            return false;
        }

        self.host = self.elect_host();
        tracing::warn!(
            room_id = %self.room_id,
            host = ?self.host,
            "Session inconsistency: host pointer repaired by re-election"
        );
        true
    }

    /// Earliest joiner, ties broken by connection id.
    fn elect_host(&self) -> Option<ConnectionId> {
        self.players
            .values()
            .min_by(|a, b| {
                a.joined_at
                    .cmp(&b.joined_at)
                    .then_with(|| a.connection_id.cmp(&b.connection_id))
            })
            .map(|p| p.connection_id.clone())
    }
}
