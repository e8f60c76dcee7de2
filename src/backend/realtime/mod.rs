//! Real-time Delivery Module
//!
//! Everything between a classified notification and the client sockets.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs      - Module exports and documentation
//! ├── registry.rs - Subscriber and room membership state
//! ├── notifier.rs - Target resolution and per-subscriber fan-out
//! └── socket.rs   - WebSocket handler for GET /live
//! ```
//!
//! # Event Types
//!
//! - `serviceRequestUpdated` - delivered to one room
//! - `servicesUpdated` - delivered to every connected subscriber
//! - `error` - reply to a malformed client frame
//!
//! # Example
//!
//! ```rust,no_run
//! use roadrescue_live::backend::realtime::{ChannelRegistry, Notifier};
//! use roadrescue_live::shared::{NotificationPayload, NotificationTarget, RoomId};
//!
//! # async fn example() {
//! let registry = ChannelRegistry::new(64);
//! let notifier = Notifier::new(registry.clone());
//! let payload = NotificationPayload::service_request_updated(serde_json::json!({}));
//! notifier.publish(payload, &NotificationTarget::Room(RoomId::new("p1"))).await;
//! # }
//! ```

/// Subscriber and room membership
pub mod registry;

/// Notification fan-out
pub mod notifier;

/// WebSocket handler
pub mod socket;

// Re-export commonly used types and functions
pub use notifier::{Notifier, PublishReport};
pub use registry::{ChannelRegistry, NotificationReceiver, Subscriber, SubscriberId};
pub use socket::handle_live_socket;
