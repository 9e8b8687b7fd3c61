use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broadcast::RoomSnapshot;
use crate::entities::room;
use crate::error::AppError;
use crate::rooms::{DEFAULT_MAX_PLAYERS, MAX_PLAYERS_RANGE};
use crate::state::AppState;

/// Longest accepted room name, in characters.
const MAX_ROOM_NAME_CHARS: usize = 64;

/// Build the room route group: `/rooms/...`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_rooms).post(create_room))
        .route("/{room_id}", get(get_room).delete(delete_room))
        .route("/{room_id}/presence", get(get_presence))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomRequest {
    name: String,
    max_players: Option<i32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomResponse {
    id: Uuid,
    created_at: String,
    name: String,
    max_players: i32,
    online_count: usize,
}

impl RoomResponse {
    fn new(model: room::Model, online_count: usize) -> Self {
        Self {
            id: model.id,
            created_at: model.created_at.to_rfc3339(),
            name: model.name,
            max_players: model.max_players,
            online_count,
        }
    }
}

async fn online_count(state: &AppState, room_id: Uuid) -> usize {
    state
        .coordinator
        .snapshot(room_id)
        .await
        .map_or(0, |snapshot| snapshot.player_count)
}

async fn find_room(state: &AppState, room_id: Uuid) -> Result<room::Model, AppError> {
    room::Entity::find_by_id(room_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Room not found.".to_string()))
}

/// `POST /api/v1/rooms`: create a room record.
async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), AppError> {
    let name = body.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_CHARS {
        return Err(AppError::BadRequest(format!(
            "Room name must be between 1 and {MAX_ROOM_NAME_CHARS} characters."
        )));
    }

    let max_players = body.max_players.unwrap_or(DEFAULT_MAX_PLAYERS);
    if !MAX_PLAYERS_RANGE.contains(&max_players) {
        return Err(AppError::BadRequest(format!(
            "maxPlayers must be between {} and {}.",
            MAX_PLAYERS_RANGE.start(),
            MAX_PLAYERS_RANGE.end()
        )));
    }

    let inserted = room::ActiveModel {
        id: Set(Uuid::new_v4()),
        created_at: Set(Utc::now().fixed_offset()),
        name: Set(name),
        max_players: Set(max_players),
    }
    .insert(&state.db)
    .await?;

    tracing::info!(room_id = %inserted.id, name = %inserted.name, max_players, "Room created");
    Ok((StatusCode::CREATED, Json(RoomResponse::new(inserted, 0))))
}

/// `GET /api/v1/rooms`: all rooms, newest first.
async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomResponse>>, AppError> {
    let rooms = room::Entity::find()
        .order_by_desc(room::Column::CreatedAt)
        .all(&state.db)
        .await?;

    let mut response = Vec::with_capacity(rooms.len());
    for model in rooms {
        let online = online_count(&state, model.id).await;
        response.push(RoomResponse::new(model, online));
    }
    Ok(Json(response))
}

/// `GET /api/v1/rooms/{roomId}`
async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomResponse>, AppError> {
    let model = find_room(&state, room_id).await?;
    let online = online_count(&state, room_id).await;
    Ok(Json(RoomResponse::new(model, online)))
}

/// `DELETE /api/v1/rooms/{roomId}`: delete the record and close its live session.
async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let model = find_room(&state, room_id).await?;
    model.delete(&state.db).await?;

    let had_session = state.coordinator.close_room(room_id).await;
    tracing::info!(%room_id, had_session, "Room deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/rooms/{roomId}/presence`: live snapshot, 404 when nobody is online.
async fn get_presence(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomSnapshot>, AppError> {
    state
        .coordinator
        .snapshot(room_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No live session for this room.".to_string()))
}
