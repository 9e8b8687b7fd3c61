mod game;
mod health;
mod rooms;
mod ws;

use axum::Router;

use crate::state::AppState;

/// Build the complete application router.
///
/// Structure:
/// - `GET /health`: lightweight liveness check
/// - `GET /api/v1/health`: database connectivity and live session counts
/// - `/api/v1/rooms`: room records and live presence
/// - `/api/v1/game/{roomId}`: game control
/// - `GET /api/v1/ws`: `WebSocket` for players
pub fn router() -> Router<AppState> {
    let api_v1 = Router::new()
        .merge(health::api_router())
        .merge(ws::router())
        .nest("/rooms", rooms::router())
        .nest("/game", game::router());

    Router::new()
        .merge(health::root_router())
        .nest("/api/v1", api_v1)
}
