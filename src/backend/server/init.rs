/**
 * Server Initialization
 *
 * This module handles the initialization of the Axum HTTP server: opening
 * the store, starting the live pipeline, and configuring the routes.
 *
 * # Initialization Process
 *
 * 1. Create the subscriber registry
 * 2. Open the store (if configured)
 * 3. Start the live pipeline, or a disabled one without a store
 * 4. Create and configure the router
 *
 * The returned `LivePipeline` must be shut down by the caller; the binary
 * does so from its graceful-shutdown future.
 */

use axum::Router;
use std::sync::Arc;

use crate::backend::feed::LivePipeline;
use crate::backend::realtime::ChannelRegistry;
use crate::backend::routes::create_router;
use crate::backend::server::config::load_store;
use crate::backend::server::state::AppState;
use crate::shared::LiveConfig;

/// Create and configure the Axum application
///
/// # Error Handling
///
/// Never fails: without a usable store the router still serves, and the
/// status endpoint reports `degraded`.
pub async fn create_app(config: &LiveConfig) -> (Router<()>, LivePipeline) {
    tracing::info!("[Startup] Initializing RoadRescue live server");

    let registry = ChannelRegistry::new(config.subscriber_queue_capacity);

    let pipeline = match load_store(config).await {
        Some(store) => {
            let store = Arc::new(store);
            LivePipeline::start(store.clone(), store, config, registry)
        }
        None => LivePipeline::disabled(registry),
    };

    let app = create_router(AppState::from_pipeline(&pipeline));
    tracing::info!("[Startup] Router configured");

    (app, pipeline)
}
