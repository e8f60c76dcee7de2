/**
 * Live Route Handlers
 *
 * # Routes
 *
 * - `GET /live` - WebSocket subscription (join/leave rooms, receive pushes)
 * - `GET /api/live/status` - Consumer state and subscriber counts
 * - `GET /api/live/rooms/{room_id}` - Size of one room
 * - `GET /health` - Liveness check
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::backend::error::BackendError;
use crate::backend::feed::ConsumerState;
use crate::backend::realtime::{handle_live_socket, ChannelRegistry};
use crate::backend::server::state::AppState;
use crate::shared::RoomId;

/// Body of `GET /api/live/status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveStatus {
    pub state: ConsumerState,
    pub subscribers: usize,
    pub rooms: usize,
}

/// Body of `GET /api/live/rooms/{room_id}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomStatus {
    pub room: RoomId,
    pub subscribers: usize,
}

/// Configure live routes
pub fn configure_live_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/live", get(handle_live_socket))
        .route("/api/live/status", get(get_live_status))
        .route("/api/live/rooms/{room_id}", get(get_room_status))
        .route("/health", get(health))
}

/// Report the consumer state and subscriber counts
pub async fn get_live_status(State(state): State<AppState>) -> Json<LiveStatus> {
    Json(LiveStatus {
        state: state.consumer_state(),
        subscribers: state.registry.subscriber_count().await,
        rooms: state.registry.room_count().await,
    })
}

/// Report how many subscribers a room has; unknown or empty rooms are 404
pub async fn get_room_status(
    State(registry): State<ChannelRegistry>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomStatus>, BackendError> {
    let room = RoomId::new(room_id);
    let subscribers = registry.room_size(&room).await;
    if subscribers == 0 {
        return Err(BackendError::handler(
            StatusCode::NOT_FOUND,
            format!("No subscribers in room {}", room),
        ));
    }
    Ok(Json(RoomStatus { room, subscribers }))
}

pub async fn health() -> &'static str {
    "ok"
}
