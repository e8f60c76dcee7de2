//! RoadRescue Live - Main Library
//!
//! Pushes changes made to the RoadRescue user collection to connected
//! clients in real time.
//!
//! # Overview
//!
//! A MongoDB change stream on one collection is consumed by a supervised
//! task. Each change is classified against a small prefix table:
//!
//! - a changed service request is sent to the owner's room
//!   (`serviceRequestUpdated`)
//! - a changed service catalog is broadcast to everyone (`servicesUpdated`)
//!
//! Clients connect over WebSocket at `GET /live` and join rooms with
//! `{"op":"join","room":"<id>"}`. If the feed cannot be kept open the
//! pipeline degrades and the rest of the server keeps running.
//!
//! # Module Structure
//!
//! - **`shared`** - Plain data types: change records, notifications, client
//!   frames, configuration
//! - **`backend`** - Feed pipeline, subscriber fan-out, MongoDB adapter,
//!   Axum server
//!
//! # Usage
//!
//! ```rust,no_run
//! use roadrescue_live::backend::server::create_app;
//! use roadrescue_live::shared::LiveConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LiveConfig::from_env()?;
//! let (app, pipeline) = create_app(&config).await;
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
//! axum::serve(listener, app).await?;
//! pipeline.shutdown().await;
//! # Ok(())
//! # }
//! ```

/// Types shared across the pipeline
pub mod shared;

/// Server-side pipeline and HTTP surface
pub mod backend;
