mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

// ──────────────────────────────────────────────────────────────────────────────
// POST /api/v1/rooms
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_room_success() {
    let app = common::app(common::test_state().await);
    let (status, body) = common::post_json(
        &app,
        "/api/v1/rooms",
        &json!({ "name": "  Village  ", "maxPlayers": 6 }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    assert_eq!(json["name"], "Village");
    assert_eq!(json["maxPlayers"], 6);
    assert_eq!(json["onlineCount"], 0);
    assert!(!json["id"].as_str().unwrap_or_default().is_empty());
}

#[tokio::test]
async fn create_room_default_max_players() {
    let app = common::app(common::test_state().await);
    let (status, body) =
        common::post_json(&app, "/api/v1/rooms", &json!({ "name": "Village" })).await;

    assert_eq!(status, StatusCode::CREATED);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    assert_eq!(json["maxPlayers"], 8);
}

#[tokio::test]
async fn create_room_rejects_bad_input() {
    let app = common::app(common::test_state().await);

    let (status, _) = common::post_json(&app, "/api/v1/rooms", &json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = common::post_json(
        &app,
        "/api/v1/rooms",
        &json!({ "name": "Village", "maxPlayers": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

// ──────────────────────────────────────────────────────────────────────────────
// GET /api/v1/rooms, GET /api/v1/rooms/{roomId}
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_rooms_returns_created_rooms() {
    let app = common::app(common::test_state().await);
    common::create_room(&app, "Village", 8).await;
    common::create_room(&app, "Hamlet", 4).await;

    let (status, body) = common::get(&app, "/api/v1/rooms").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    assert_eq!(json.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn get_room_reports_online_count() {
    let state = common::test_state().await;
    let app = common::app(state.clone());
    let room_id = common::create_room(&app, "Village", 8).await;
    let room_uuid = room_id.parse::<Uuid>().unwrap_or_default();

    let joined = state
        .coordinator
        .on_join(room_uuid, "conn-a".into(), Uuid::new_v4(), "Ann")
        .await;
    assert!(joined.is_ok());

    let (status, body) = common::get(&app, &format!("/api/v1/rooms/{room_id}")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    assert_eq!(json["onlineCount"], 1);
}

#[tokio::test]
async fn get_unknown_room_returns_404() {
    let app = common::app(common::test_state().await);
    let (status, body) = common::get(&app, &format!("/api/v1/rooms/{}", Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

// ──────────────────────────────────────────────────────────────────────────────
// GET /api/v1/rooms/{roomId}/presence
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn presence_returns_live_snapshot() {
    let state = common::test_state().await;
    let app = common::app(state.clone());
    let room_id = common::create_room(&app, "Village", 8).await;
    let room_uuid = room_id.parse::<Uuid>().unwrap_or_default();

    let (status, _) = common::get(&app, &format!("/api/v1/rooms/{room_id}/presence")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for (conn, name) in [("conn-a", "Ann"), ("conn-b", "Bob")] {
        let joined = state
            .coordinator
            .on_join(room_uuid, conn.into(), Uuid::new_v4(), name)
            .await;
        assert!(joined.is_ok());
    }

    let (status, body) = common::get(&app, &format!("/api/v1/rooms/{room_id}/presence")).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
    assert_eq!(json["roomName"], "Village");
    assert_eq!(json["playerCount"], 2);
    assert_eq!(json["hostUsername"], "Ann");
    assert_eq!(json["phase"], "WAITING");
}

#[tokio::test]
async fn join_beyond_capacity_is_refused() {
    let state = common::test_state().await;
    let app = common::app(state.clone());
    let room_id = common::create_room(&app, "Tiny", 1).await;
    let room_uuid = room_id.parse::<Uuid>().unwrap_or_default();

    let first = state
        .coordinator
        .on_join(room_uuid, "conn-a".into(), Uuid::new_v4(), "Ann")
        .await;
    assert!(first.is_ok());
    let second = state
        .coordinator
        .on_join(room_uuid, "conn-b".into(), Uuid::new_v4(), "Bob")
        .await;
    assert!(second.is_err_and(|e| e.code() == "ROOM_FULL"));
}

// ──────────────────────────────────────────────────────────────────────────────
// DELETE /api/v1/rooms/{roomId}
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_room_closes_live_session() {
    let state = common::test_state().await;
    let app = common::app(state.clone());
    let room_id = common::create_room(&app, "Village", 8).await;
    let room_uuid = room_id.parse::<Uuid>().unwrap_or_default();

    let joined = state
        .coordinator
        .on_join(room_uuid, "conn-a".into(), Uuid::new_v4(), "Ann")
        .await;
    assert!(joined.is_ok());
    assert_eq!(state.coordinator.active_rooms(), 1);

    let (status, _) = common::delete(&app, &format!("/api/v1/rooms/{room_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(state.coordinator.active_rooms(), 0);

    let (status, _) = common::get(&app, &format!("/api/v1/rooms/{room_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = common::delete(&app, &format!("/api/v1/rooms/{room_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
