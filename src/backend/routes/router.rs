/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * all route configurations into a single Axum router.
 *
 * # Route Order
 *
 * 1. Live routes (WebSocket, status, health)
 * 2. Fallback handler (404)
 *
 * Every request is traced through `TraceLayer`.
 */

use axum::{http::StatusCode, Router};
use tower_http::trace::TraceLayer;

use crate::backend::routes::live_routes::configure_live_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
///
/// # Route Details
///
/// - `GET /live` - WebSocket subscription
/// - `GET /api/live/status` - Live pipeline status
/// - `GET /api/live/rooms/{room_id}` - Room size
/// - `GET /health` - Liveness check
///
/// Unknown routes return 404.
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = configure_live_routes(Router::new());

    // Fallback handler for 404
    let router = router.fallback(|| async { (StatusCode::NOT_FOUND, "404 Not Found") });

    router.layer(TraceLayer::new_for_http()).with_state(app_state)
}
