#![allow(dead_code)]

use std::net::IpAddr;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use migration::{Migrator, MigratorTrait};
use tower::ServiceExt;

use werewolf_api::config::{Config, Environment};
use werewolf_api::state::AppState;

/// Application state backed by an in-memory `SQLite` database with migrations.
pub async fn test_state() -> AppState {
    let db = werewolf_api::db::connect("sqlite::memory:")
        .await
        .unwrap_or_default();
    Migrator::up(&db, None).await.unwrap_or_default();

    AppState::new(
        db,
        Config {
            database_url: String::new(),
            server_host: IpAddr::from([127, 0, 0, 1]),
            server_port: 0,
            environment: Environment::Development,
            log_level: "warn".to_string(),
            frontend_url: "http://localhost:3001".to_string(),
            heartbeat_interval: Duration::from_secs(45),
            heartbeat_timeout: Duration::from_secs(60),
            phase_duration: Duration::from_secs(60),
            min_players: 3,
            auto_advance_phases: false,
        },
    )
}

/// Build the app router over `state`.
pub fn app(state: AppState) -> Router {
    werewolf_api::routes::router().with_state(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap_or_default();

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .unwrap_or_default();
    let body_str = String::from_utf8(body.to_vec()).unwrap_or_default();

    (status, body_str)
}

/// Test helper: send a GET request to the app and return (status, body).
pub async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_default();
    send(app, request).await
}

/// Test helper: send a JSON POST request to the app and return (status, body).
pub async fn post_json(app: &Router, uri: &str, body: &serde_json::Value) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_default();
    send(app, request).await
}

/// Test helper: send a DELETE request to the app and return (status, body).
pub async fn delete(app: &Router, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_default();
    send(app, request).await
}

/// Create a room through the API and return its id.
pub async fn create_room(app: &Router, name: &str, max_players: i32) -> String {
    let (status, body) = post_json(
        app,
        "/api/v1/rooms",
        &serde_json::json!({ "name": name, "maxPlayers": max_players }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create room failed: {body}");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    json["id"].as_str().unwrap_or_default().to_string()
}
