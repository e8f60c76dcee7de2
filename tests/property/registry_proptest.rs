//! Property-based tests for room-scoped delivery

use proptest::prelude::*;
use serde_json::json;

use roadrescue_live::backend::realtime::{ChannelRegistry, Notifier};
use roadrescue_live::shared::{NotificationPayload, NotificationTarget, RoomId};

const ROOMS: &[&str] = &["p0", "p1", "p2", "p3"];

proptest! {
    #[test]
    fn test_room_publish_reaches_exactly_its_members(
        memberships in proptest::collection::vec(proptest::option::of(0usize..4), 1..24),
        target in 0usize..4,
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let registry = ChannelRegistry::new(4);
            let notifier = Notifier::new(registry.clone());

            let mut subscribers = Vec::new();
            for membership in &memberships {
                let (id, receiver) = registry.register().await.unwrap();
                if let Some(room) = membership {
                    registry.join(id, RoomId::new(ROOMS[*room])).await;
                }
                subscribers.push((*membership, receiver));
            }

            let room = RoomId::new(ROOMS[target]);
            let payload = NotificationPayload::service_request_updated(json!({ "requestId": "r0" }));
            let report = notifier.publish(payload, &NotificationTarget::Room(room)).await;

            let members = memberships.iter().filter(|m| **m == Some(target)).count();
            prop_assert_eq!(report.delivered, members);

            for (membership, receiver) in subscribers.iter_mut() {
                let received = receiver.try_recv().is_ok();
                prop_assert_eq!(received, *membership == Some(target));
            }
            Ok(())
        })?;
    }

    #[test]
    fn test_broadcast_reaches_everyone(count in 1usize..32) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let registry = ChannelRegistry::new(1);
            let notifier = Notifier::new(registry.clone());
            let mut receivers = Vec::new();
            for _ in 0..count {
                receivers.push(registry.register().await.unwrap().1);
            }

            let payload = NotificationPayload::services_updated(json!([]));
            let report = notifier.publish(payload, &NotificationTarget::Broadcast).await;

            prop_assert_eq!(report.delivered, count);
            for receiver in receivers.iter_mut() {
                prop_assert!(receiver.try_recv().is_ok());
                prop_assert!(receiver.try_recv().is_err());
            }
            Ok(())
        })?;
    }
}
