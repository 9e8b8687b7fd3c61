//! Durable room records.
//!
//! The coordinator only needs to know whether a room exists and how many players it
//! holds; [`RoomDirectory`] is that seam, and [`DbRoomDirectory`] answers it from the
//! `room` table.

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::entities::room;

/// Default `max_players` for new rooms.
pub const DEFAULT_MAX_PLAYERS: i32 = 8;

/// Accepted `max_players` range.
pub const MAX_PLAYERS_RANGE: std::ops::RangeInclusive<i32> = 1..=32;

/// What the coordinator needs to know about a room at join time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub name: String,
    pub max_players: usize,
}

impl From<room::Model> for RoomRecord {
    fn from(model: room::Model) -> Self {
        Self {
            name: model.name,
            max_players: usize::try_from(model.max_players).unwrap_or(0),
        }
    }
}

/// Lookup of durable room records.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// `Ok(None)` when the room does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be queried.
    async fn find_room(&self, room_id: Uuid) -> anyhow::Result<Option<RoomRecord>>;
}

/// [`RoomDirectory`] backed by the `room` table.
#[derive(Debug, Clone)]
pub struct DbRoomDirectory {
    db: DatabaseConnection,
}

impl DbRoomDirectory {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RoomDirectory for DbRoomDirectory {
    async fn find_room(&self, room_id: Uuid) -> anyhow::Result<Option<RoomRecord>> {
        let found = room::Entity::find_by_id(room_id).one(&self.db).await?;
        Ok(found.map(RoomRecord::from))
    }
}
