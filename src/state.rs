use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::broadcast::channels::WsChannels;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::rooms::DbRoomDirectory;

/// Shared application state available to all request handlers via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Config,
    pub coordinator: Coordinator,
    pub channels: WsChannels,
}

impl AppState {
    /// Wire the coordinator to the database-backed directory and the `WebSocket` channels.
    #[must_use]
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let channels = WsChannels::new();
        let coordinator = Coordinator::new(
            Arc::new(DbRoomDirectory::new(db.clone())),
            Arc::new(channels.clone()),
            Arc::new(channels.clone()),
            config.game_settings(),
        );
        Self {
            db,
            config,
            coordinator,
            channels,
        }
    }
}
