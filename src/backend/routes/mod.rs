//! Route Configuration Module
//!
//! This module configures all HTTP routes for the live server.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation
//! └── live_routes.rs  - Live subscription and status handlers
//! ```
//!
//! # Routes
//!
//! - `GET /live` - WebSocket subscription
//! - `GET /api/live/status` - `{"state":"streaming","subscribers":3,"rooms":2}`
//! - `GET /api/live/rooms/{room_id}` - `{"room":"..","subscribers":1}`
//! - `GET /health` - `ok`

/// Main router creation
pub mod router;

/// Live route handlers
pub mod live_routes;

// Re-export commonly used functions
pub use router::create_router;
