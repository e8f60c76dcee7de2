/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * `FromRef` so the live socket handler can extract the registry.
 *
 * # Architecture
 *
 * `AppState` holds:
 * - the subscriber registry shared with the notifier
 * - a receiver observing the change feed consumer's state
 *
 * Both are cheap to clone; the registry is `Arc<RwLock<..>>` inside.
 *
 * # Example
 *
 * ```rust,no_run
 * use roadrescue_live::backend::realtime::ChannelRegistry;
 * use axum::extract::State;
 *
 * async fn handler(State(registry): State<ChannelRegistry>) {
 *     let count = registry.subscriber_count().await;
 * }
 * ```
 */

use axum::extract::FromRef;
use tokio::sync::watch;

use crate::backend::feed::{ConsumerState, LivePipeline};
use crate::backend::realtime::ChannelRegistry;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    /// Live subscribers and their rooms
    pub registry: ChannelRegistry,

    /// Published by the supervisor on every transition
    pub consumer_state: watch::Receiver<ConsumerState>,
}

impl AppState {
    pub fn new(registry: ChannelRegistry, consumer_state: watch::Receiver<ConsumerState>) -> Self {
        Self {
            registry,
            consumer_state,
        }
    }

    pub fn from_pipeline(pipeline: &LivePipeline) -> Self {
        Self::new(pipeline.registry().clone(), pipeline.state_receiver())
    }

    pub fn consumer_state(&self) -> ConsumerState {
        *self.consumer_state.borrow()
    }
}

impl FromRef<AppState> for ChannelRegistry {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.registry.clone()
    }
}
