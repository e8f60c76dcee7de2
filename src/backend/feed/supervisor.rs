/**
 * Backoff Supervisor
 *
 * Keeps the change feed alive. The transition logic is a plain state machine
 * (`SupervisorMachine`) that turns events into directives; the `Supervisor`
 * task is the only place side effects happen: opening the feed, sleeping
 * between attempts, and consuming records.
 *
 * # States
 *
 * ```text
 * Disconnected --start--> Connecting --opened--> Streaming
 *                            ^   |                  |
 *              delay elapsed |   | connect failed   | feed lost
 *                            |   v                  v
 *                           Backoff <---------------+
 *
 * N consecutive connect failures, or any fatal error --> Degraded (terminal)
 * ```
 *
 * Entering `Streaming` resets both the failure count and the backoff
 * position. Records are classified and published one at a time so
 * subscribers see them in feed order.
 */

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::backend::error::ClassifyError;
use crate::backend::feed::backoff::BackoffPolicy;
use crate::backend::feed::classifier::{EventClassifier, OwnerLookup};
use crate::backend::feed::consumer::{ChangeFeedConsumer, ChangeSource};
use crate::backend::realtime::Notifier;
use crate::shared::ChangeRecord;

/// Lifecycle state of the change feed consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Streaming,
    Backoff,
    /// Real-time delivery is off for the rest of the process lifetime
    Degraded,
}

impl ConsumerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Backoff => "backoff",
            Self::Degraded => "degraded",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Degraded)
    }
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    Start,
    /// The feed was opened
    Opened,
    /// Opening the feed failed transiently
    ConnectFailed,
    /// An open feed broke or ended
    FeedLost,
    /// Non-retryable failure
    Fatal,
    /// The backoff delay has passed
    DelayElapsed,
    Stop,
}

/// What the driver must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Connect,
    Consume,
    Wait(Duration),
    /// Enter the terminal state; issued exactly once
    Degrade,
    /// Nothing left to do
    Idle,
}

/// Pure supervisor transition logic
#[derive(Debug, Clone)]
pub struct SupervisorMachine {
    state: ConsumerState,
    /// Consecutive failed connects since the last `Streaming`
    failures: u32,
    /// Position in the backoff schedule since the last `Streaming`
    backoff_index: u32,
    policy: BackoffPolicy,
    max_attempts: u32,
}

impl SupervisorMachine {
    pub fn new(policy: BackoffPolicy, max_attempts: u32) -> Self {
        Self {
            state: ConsumerState::Disconnected,
            failures: 0,
            backoff_index: 0,
            policy,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Apply one event and return the next directive
    pub fn apply(&mut self, event: SupervisorEvent) -> Directive {
        use ConsumerState as S;
        use SupervisorEvent as E;

        match (self.state, event) {
            (S::Degraded, _) => Directive::Idle,
            (_, E::Stop) => {
                self.state = S::Disconnected;
                Directive::Idle
            }
            (_, E::Fatal) => self.degrade(),
            (S::Disconnected, E::Start) | (S::Backoff, E::DelayElapsed) => {
                self.state = S::Connecting;
                Directive::Connect
            }
            (S::Connecting, E::Opened) => {
                self.failures = 0;
                self.backoff_index = 0;
                self.state = S::Streaming;
                Directive::Consume
            }
            (S::Connecting, E::ConnectFailed) => {
                self.failures += 1;
                if self.failures >= self.max_attempts {
                    self.degrade()
                } else {
                    self.back_off()
                }
            }
            (S::Streaming, E::FeedLost) => self.back_off(),
            (state, event) => {
                tracing::debug!("[Supervisor] Ignoring {:?} while {}", event, state);
                Directive::Idle
            }
        }
    }

    fn back_off(&mut self) -> Directive {
        let delay = self.policy.delay(self.backoff_index);
        self.backoff_index = self.backoff_index.saturating_add(1);
        self.state = ConsumerState::Backoff;
        Directive::Wait(delay)
    }

    fn degrade(&mut self) -> Directive {
        self.state = ConsumerState::Degraded;
        Directive::Degrade
    }
}

/// Resolves once shutdown is requested or its sender is gone
pub(crate) async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Task driving one change feed consumer
pub struct Supervisor<S, L> {
    consumer: ChangeFeedConsumer<S>,
    classifier: EventClassifier<L>,
    notifier: Notifier,
    machine: SupervisorMachine,
    state_tx: watch::Sender<ConsumerState>,
    shutdown: watch::Receiver<bool>,
}

impl<S: ChangeSource, L: OwnerLookup> Supervisor<S, L> {
    pub fn new(
        consumer: ChangeFeedConsumer<S>,
        classifier: EventClassifier<L>,
        notifier: Notifier,
        machine: SupervisorMachine,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (state_tx, _) = watch::channel(machine.state());
        Self {
            consumer,
            classifier,
            notifier,
            machine,
            state_tx,
            shutdown,
        }
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConsumerState> {
        self.state_tx.subscribe()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drive the feed until shutdown or degradation
    pub async fn run(mut self) {
        let mut directive = self.step(SupervisorEvent::Start);

        loop {
            let event = match directive {
                Directive::Connect => self.connect().await,
                Directive::Consume => self.consume().await,
                Directive::Wait(delay) => {
                    tracing::info!("[Supervisor] Reconnecting in {:?}", delay);
                    tokio::select! {
                        biased;
                        _ = stopped(&mut self.shutdown) => SupervisorEvent::Stop,
                        _ = tokio::time::sleep(delay) => SupervisorEvent::DelayElapsed,
                    }
                }
                Directive::Degrade => {
                    tracing::error!(
                        "[Supervisor] Change feed on {} degraded ({} consecutive connect failures), real-time updates disabled",
                        self.consumer.collection(),
                        self.machine.failures()
                    );
                    break;
                }
                Directive::Idle => break,
            };
            directive = self.step(event);
        }

        self.consumer.close();
        tracing::debug!("[Supervisor] Stopped in state {}", self.machine.state());
    }

    fn step(&mut self, event: SupervisorEvent) -> Directive {
        let before = self.machine.state();
        let directive = self.machine.apply(event);
        let after = self.machine.state();
        if before != after {
            tracing::info!("[Supervisor] {} -> {}", before, after);
            self.state_tx.send_replace(after);
        }
        directive
    }

    async fn connect(&mut self) -> SupervisorEvent {
        let result = tokio::select! {
            biased;
            _ = stopped(&mut self.shutdown) => return SupervisorEvent::Stop,
            result = self.consumer.open() => result,
        };

        match result {
            Ok(()) => SupervisorEvent::Opened,
            Err(err) if err.is_fatal() => {
                tracing::error!("[Supervisor] {}", err);
                SupervisorEvent::Fatal
            }
            Err(err) => {
                tracing::warn!(
                    "[Supervisor] Connect attempt {} failed: {}",
                    self.machine.failures() + 1,
                    err
                );
                SupervisorEvent::ConnectFailed
            }
        }
    }

    async fn consume(&mut self) -> SupervisorEvent {
        loop {
            let next = tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => return SupervisorEvent::Stop,
                next = self.consumer.next() => next,
            };

            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(err)) if err.is_fatal() => {
                    tracing::error!("[Supervisor] {}", err);
                    return SupervisorEvent::Fatal;
                }
                Some(Err(err)) => {
                    tracing::warn!("[Supervisor] Feed lost: {}", err);
                    return SupervisorEvent::FeedLost;
                }
                None => {
                    tracing::warn!("[Supervisor] Feed on {} ended", self.consumer.collection());
                    return SupervisorEvent::FeedLost;
                }
            };

            tokio::select! {
                biased;
                _ = stopped(&mut self.shutdown) => return SupervisorEvent::Stop,
                _ = dispatch(&self.classifier, &self.notifier, record) => {}
            }
        }
    }
}

/// Classify one record and publish the result
async fn dispatch<L: OwnerLookup>(
    classifier: &EventClassifier<L>,
    notifier: &Notifier,
    record: ChangeRecord,
) {
    match classifier.classify(&record).await {
        Ok(Some((payload, target))) => {
            let kind = payload.kind.clone();
            let report = notifier.publish(payload, &target).await;
            tracing::debug!(
                "[Feed] {} for {} -> {} delivered, {} dropped",
                kind,
                record.document_id,
                report.delivered,
                report.dropped
            );
        }
        Ok(None) => {}
        Err(ClassifyError::LookupMiss(id)) => {
            tracing::warn!("[Feed] No owner found for {}, dropping {} event", id, record.operation);
        }
        Err(err) => {
            tracing::warn!("[Feed] Dropping {} event for {}: {}", record.operation, record.document_id, err);
        }
    }
}
