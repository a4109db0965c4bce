//! Control Surface Handlers
//!
//! HTTP endpoints for joining/leaving rooms, listing sessions, and health.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AppState;
use crate::session::SessionError;

/// Request to join a room.
#[derive(Debug, Deserialize, Validate)]
pub struct JoinRoomRequest {
    /// Room ID to join.
    #[validate(length(min = 1, max = 128, message = "room_id must be 1-128 characters"))]
    pub room_id: String,
    /// Custom system prompt for the agent. Falls back to the configured
    /// default when absent.
    pub system_prompt: Option<String>,
}

/// Response for a successful join.
#[derive(Debug, Serialize)]
pub struct JoinRoomResponse {
    pub success: bool,
    pub room_id: String,
    pub message: String,
}

/// Response for a successful leave.
#[derive(Debug, Serialize)]
pub struct LeaveRoomResponse {
    pub success: bool,
    pub message: String,
}

/// Active room listing.
#[derive(Debug, Serialize)]
pub struct RoomsResponse {
    pub active_rooms: Vec<String>,
    pub count: usize,
}

/// Health check payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
    pub active_sessions: usize,
}

/// Health check endpoint.
///
/// GET /
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        service: "Voice Agent API",
        status: "running",
        active_sessions: state.registry.active_count(),
    })
}

/// Join a room and start a voice agent in it.
///
/// POST /join_room
pub async fn join_room(
    State(state): State<AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Json<JoinRoomResponse>, SessionError> {
    req.validate()
        .map_err(|e| SessionError::Validation(e.to_string()))?;

    let session = state.registry.join(&req.room_id, req.system_prompt).await?;

    Ok(Json(JoinRoomResponse {
        success: true,
        room_id: session.room_id.clone(),
        message: format!(
            "Agent successfully joined room {} and is ready to chat",
            session.room_id
        ),
    }))
}

/// Leave a room and stop its agent.
///
/// POST /leave_room/{room_id}
pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<LeaveRoomResponse>, SessionError> {
    state.registry.leave(&room_id).await?;

    Ok(Json(LeaveRoomResponse {
        success: true,
        message: format!("Left room {room_id}"),
    }))
}

/// List all active rooms.
///
/// GET /rooms
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomsResponse> {
    let active_rooms = state.registry.list();
    let count = active_rooms.len();

    Json(RoomsResponse {
        active_rooms,
        count,
    })
}
