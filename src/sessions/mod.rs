//! In-memory registry of live room sessions.
//!
//! The registry maps room ids to sessions, each behind its own async mutex. Every
//! mutation of a room (join, leave, heartbeat, game action, eviction) runs under that
//! room's lock, while unrelated rooms proceed in parallel. Nothing here is persisted;
//! a session exists only while at least one player is connected.

pub mod presence;
pub mod room;

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use presence::{ConnectionId, PlayerPresence};
pub use room::{Departure, JoinOutcome, RoomSession};

/// Handle to one room's session. Lock it to read or mutate.
pub type SharedSession = Arc<Mutex<RoomSession>>;

/// Tracks all live room sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    /// `room_id` → session
    sessions: Arc<DashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Return the room's session, creating it if absent.
    ///
    /// Creation goes through the map's entry API, so concurrent first joins all receive
    /// the same session.
    pub fn get_or_create(&self, room_id: Uuid, room_name: &str) -> SharedSession {
        let entry = self.sessions.entry(room_id).or_insert_with(|| {
            tracing::info!(%room_id, room_name, "Created session for room");
            Arc::new(Mutex::new(RoomSession::new(
                room_id,
                room_name.to_string(),
                Instant::now(),
            )))
        });
        Arc::clone(entry.value())
    }

    /// Look up a session without creating one. `None` means nobody is online.
    #[must_use]
    pub fn get(&self, room_id: Uuid) -> Option<SharedSession> {
        self.sessions
            .get(&room_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Drop a room's session from the registry. Idempotent.
    pub fn remove(&self, room_id: Uuid) -> Option<SharedSession> {
        self.sessions.remove(&room_id).map(|(_, session)| session)
    }

    /// Drop the room's entry only if it still maps to `session`.
    ///
    /// Used once a session has emptied; a fresh session created since is left alone.
    pub fn discard(&self, room_id: Uuid, session: &SharedSession) {
        if self
            .sessions
            .remove_if(&room_id, |_, current| Arc::ptr_eq(current, session))
            .is_some()
        {
            tracing::info!(%room_id, "Cleaned up empty session");
        }
    }

    /// Snapshot of every live session, safe to iterate across `.await` points.
    #[must_use]
    pub fn entries(&self) -> Vec<(Uuid, SharedSession)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
