use std::time::Instant;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct RootHealth {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct DatabaseHealth {
    connected: bool,
    latency_ms: u128,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiHealth {
    status: &'static str,
    version: &'static str,
    database: DatabaseHealth,
    active_rooms: usize,
    connections: usize,
}

/// `GET /health`: liveness only, no dependencies touched.
pub fn root_router() -> Router<AppState> {
    Router::new().route("/health", get(root_health))
}

/// `GET /api/v1/health`: database ping plus live session counts.
pub fn api_router() -> Router<AppState> {
    Router::new().route("/health", get(api_health))
}

async fn root_health() -> Json<RootHealth> {
    Json(RootHealth {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn api_health(State(state): State<AppState>) -> Json<ApiHealth> {
    let started = Instant::now();
    let connected = state.db.ping().await.is_ok();
    let latency_ms = started.elapsed().as_millis();

    if !connected {
        tracing::warn!("Health check: database ping failed");
    }

    Json(ApiHealth {
        status: if connected { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database: DatabaseHealth {
            connected,
            latency_ms,
        },
        active_rooms: state.coordinator.active_rooms(),
        connections: state.channels.connection_count(),
    })
}
