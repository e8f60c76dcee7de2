//! Live pipeline handle
//!
//! Owns the supervisor task and the store handle. Teardown runs in a fixed
//! order: stop the supervisor (which cancels any backoff timer and closes the
//! active feed), disconnect every subscriber, then close the store.
//!
//! The handle is cheap to clone so the graceful-shutdown future and the
//! server's exit path can share it. Dropping the last clone signals the
//! supervisor to stop.

use futures_util::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::backend::feed::backoff::BackoffPolicy;
use crate::backend::feed::classifier::{ClassificationTable, EventClassifier, OwnerLookup};
use crate::backend::feed::consumer::{ChangeFeedConsumer, ChangeSource};
use crate::backend::feed::supervisor::{ConsumerState, Supervisor, SupervisorMachine};
use crate::backend::realtime::{ChannelRegistry, Notifier};
use crate::shared::LiveConfig;

struct PipelineInner {
    registry: ChannelRegistry,
    state: watch::Receiver<ConsumerState>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    closer: Mutex<Option<BoxFuture<'static, ()>>>,
}

impl Drop for PipelineInner {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Running live-update pipeline
#[derive(Clone)]
pub struct LivePipeline {
    inner: Arc<PipelineInner>,
}

impl LivePipeline {
    /// Start supervising the change feed of `config.collection`
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S, L>(source: Arc<S>, lookup: Arc<L>, config: &LiveConfig, registry: ChannelRegistry) -> Self
    where
        S: ChangeSource,
        L: OwnerLookup,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let consumer = ChangeFeedConsumer::new(source.clone(), &config.collection);
        let classifier = EventClassifier::new(
            ClassificationTable::from_config(config),
            lookup,
            &config.collection,
        );
        let machine = SupervisorMachine::new(
            BackoffPolicy::new(config.backoff_base, config.backoff_cap),
            config.max_reconnect_attempts,
        );
        let supervisor = Supervisor::new(
            consumer,
            classifier,
            Notifier::new(registry.clone()),
            machine,
            shutdown_rx,
        );
        let state = supervisor.subscribe();
        let task = supervisor.spawn();

        let closer: BoxFuture<'static, ()> = Box::pin(async move { source.close().await });

        tracing::info!("[Supervisor] Live pipeline started for {}", config.collection);
        Self::from_parts(registry, state, shutdown_tx, Some(task), Some(closer))
    }

    /// A pipeline that never streams, for when no store is configured
    pub fn disabled(registry: ChannelRegistry) -> Self {
        let (_, state) = watch::channel(ConsumerState::Degraded);
        let (shutdown_tx, _) = watch::channel(false);
        tracing::warn!("[Supervisor] No change feed configured, real-time updates disabled");
        Self::from_parts(registry, state, shutdown_tx, None, None)
    }

    fn from_parts(
        registry: ChannelRegistry,
        state: watch::Receiver<ConsumerState>,
        shutdown: watch::Sender<bool>,
        task: Option<JoinHandle<()>>,
        closer: Option<BoxFuture<'static, ()>>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                registry,
                state,
                shutdown,
                task: Mutex::new(task),
                closer: Mutex::new(closer),
            }),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.inner.registry
    }

    /// Current consumer state
    pub fn state(&self) -> ConsumerState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn state_receiver(&self) -> watch::Receiver<ConsumerState> {
        self.inner.state.clone()
    }

    /// Stop the pipeline; later calls return immediately
    pub async fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        tracing::info!("[Supervisor] Shutting down live pipeline");

        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("[Supervisor] Supervisor task failed: {}", e);
            }
        }

        let disconnected = self.inner.registry.disconnect_all().await;
        tracing::info!("[Supervisor] Disconnected {} subscriber(s)", disconnected);

        let close_store = self.inner.closer.lock().await.take();
        if let Some(close_store) = close_store {
            close_store.await;
        }
        tracing::info!("[Supervisor] Live pipeline stopped");
    }
}
