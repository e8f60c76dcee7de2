/**
 * Notification Fan-out
 *
 * The notifier resolves a classified notification's target to a concrete
 * subscriber set through the `ChannelRegistry` and queues the event on each
 * subscriber independently.
 *
 * # Isolation
 *
 * Delivery uses `try_send` on the bounded per-subscriber queue, so a slow
 * subscriber never stalls the publish:
 * - queue full: that subscriber's copy is dropped
 * - queue closed: the subscriber is removed from the registry
 *
 * The subscriber set is snapshotted when `publish` starts; connections that
 * register afterwards do not receive the event.
 */

use tokio::sync::mpsc::error::TrySendError;

use crate::backend::error::DeliveryError;
use crate::backend::realtime::registry::{ChannelRegistry, Subscriber};
use crate::shared::{NotificationPayload, NotificationTarget, RealtimeEvent};

/// Outcome of a single publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers whose queue accepted the event
    pub delivered: usize,
    /// Subscribers whose queue was full
    pub dropped: usize,
    /// Subscribers removed because their queue was closed
    pub disconnected: usize,
}

enum Delivery {
    Queued,
    Dropped,
}

fn deliver(subscriber: &Subscriber, event: RealtimeEvent) -> Result<Delivery, DeliveryError> {
    match subscriber.try_deliver(event) {
        Ok(()) => Ok(Delivery::Queued),
        Err(TrySendError::Full(_)) => Ok(Delivery::Dropped),
        Err(TrySendError::Closed(_)) => Err(DeliveryError {
            subscriber: subscriber.id(),
        }),
    }
}

/// Publishes notifications to live subscribers
#[derive(Debug, Clone)]
pub struct Notifier {
    registry: ChannelRegistry,
}

impl Notifier {
    pub fn new(registry: ChannelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Deliver `payload` to every subscriber in scope of `target`
    pub async fn publish(
        &self,
        payload: NotificationPayload,
        target: &NotificationTarget,
    ) -> PublishReport {
        let subscribers = match target {
            NotificationTarget::Room(room) => self.registry.members_of(room).await,
            NotificationTarget::Broadcast => self.registry.all_subscribers().await,
        };

        let event = RealtimeEvent::from(payload);
        let mut report = PublishReport::default();
        let mut broken = Vec::new();

        for subscriber in &subscribers {
            match deliver(subscriber, event.clone()) {
                Ok(Delivery::Queued) => report.delivered += 1,
                Ok(Delivery::Dropped) => {
                    report.dropped += 1;
                    tracing::warn!(
                        "[Realtime] Queue full for subscriber {}, dropping {} event",
                        subscriber.id(),
                        event.event
                    );
                }
                Err(err) => broken.push(err),
            }
        }

        for err in broken {
            tracing::warn!("[Realtime] {}", err);
            if self.registry.remove_subscriber(err.subscriber).await {
                report.disconnected += 1;
            }
        }

        match target {
            NotificationTarget::Room(room) => tracing::info!(
                "[Realtime] {} delivered to {} subscriber(s) in room {}",
                event.event,
                report.delivered,
                room
            ),
            NotificationTarget::Broadcast => tracing::info!(
                "[Realtime] {} broadcast to {} subscriber(s)",
                event.event,
                report.delivered
            ),
        }

        report
    }
}
