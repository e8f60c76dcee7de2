//! Shared Module
//!
//! Plain data types used on both sides of the pipeline: change records
//! decoded from the store, the notifications derived from them, the frames
//! exchanged with WebSocket clients, and the service configuration.
//!
//! Nothing in this module touches the network or the store driver.

/// Normalized mutation records
pub mod change;

/// Notifications and client frames
pub mod event;

/// Shared error types
pub mod error;

/// Service configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use change::{ChangeRecord, DocumentId, FeedItem, OperationKind, ResumeToken};
pub use config::{ConfigError, LiveConfig, LiveConfigBuilder};
pub use error::SharedError;
pub use event::{ClientCommand, EventType, NotificationPayload, NotificationTarget, RealtimeEvent, RoomId};
