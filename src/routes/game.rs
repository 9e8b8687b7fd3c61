//! Game control for trusted callers (admin tools, external timers).
//!
//! The `WebSocket` surface derives the actor from the connection; these routes take it
//! from the request body instead.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::game::controller::NightOutcome;
use crate::game::{NightAction, Phase, Role, Winner};
use crate::state::AppState;

/// Build the game route group: `/game/{roomId}/...`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}/start", post(start_game))
        .route("/{room_id}/vote", post(cast_vote))
        .route("/{room_id}/action", post(night_action))
        .route("/{room_id}/phase", post(change_phase))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteRequest {
    voter_id: Uuid,
    target_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NightActionRequest {
    actor_id: Uuid,
    target_id: Uuid,
    action: String,
}

#[derive(Deserialize)]
struct PhaseRequest {
    phase: Phase,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GameStatus {
    room_id: Uuid,
    phase: Phase,
    day_number: u32,
    winner: Option<Winner>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoteResponse {
    room_id: Uuid,
    votes_cast: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NightActionResponse {
    room_id: Uuid,
    target_id: Uuid,
    /// Set for investigations only.
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
    winner: Option<Winner>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PhaseResponse {
    room_id: Uuid,
    from: Phase,
    to: Phase,
    eliminated: Option<Uuid>,
    winner: Option<Winner>,
}

async fn status(state: &AppState, room_id: Uuid) -> Result<GameStatus, AppError> {
    let snapshot = state
        .coordinator
        .snapshot(room_id)
        .await
        .ok_or_else(|| AppError::NotFound("No live session for this room.".to_string()))?;
    Ok(GameStatus {
        room_id,
        phase: snapshot.phase,
        day_number: snapshot.day_number,
        winner: snapshot.winner,
    })
}

/// `POST /api/v1/game/{roomId}/start`
async fn start_game(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<GameStatus>, AppError> {
    state.coordinator.start_game(room_id).await?;
    Ok(Json(status(&state, room_id).await?))
}

/// `POST /api/v1/game/{roomId}/vote`
async fn cast_vote(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let votes_cast = state
        .coordinator
        .vote(room_id, body.voter_id, body.target_id)
        .await?;
    Ok(Json(VoteResponse {
        room_id,
        votes_cast,
    }))
}

/// `POST /api/v1/game/{roomId}/action`
async fn night_action(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<NightActionRequest>,
) -> Result<Json<NightActionResponse>, AppError> {
    let action = body
        .action
        .parse::<NightAction>()
        .map_err(AppError::BadRequest)?;

    let outcome = state
        .coordinator
        .night_action(room_id, body.actor_id, body.target_id, action)
        .await?;

    let response = match outcome {
        NightOutcome::Killed { target_id, winner } => NightActionResponse {
            room_id,
            target_id,
            role: None,
            winner,
        },
        NightOutcome::Revealed {
            target_id, role, ..
        } => NightActionResponse {
            room_id,
            target_id,
            role: Some(role),
            winner: None,
        },
    };
    Ok(Json(response))
}

/// `POST /api/v1/game/{roomId}/phase`
async fn change_phase(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<PhaseRequest>,
) -> Result<Json<PhaseResponse>, AppError> {
    let change = state.coordinator.change_phase(room_id, body.phase).await?;
    Ok(Json(PhaseResponse {
        room_id,
        from: change.from,
        to: change.to,
        eliminated: change.eliminated,
        winner: change.winner,
    }))
}
