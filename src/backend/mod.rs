//! Backend Module
//!
//! This module contains all server-side code for the RoadRescue live-update
//! service: the change feed pipeline, the WebSocket fan-out, the MongoDB
//! adapter and the Axum server around them.
//!
//! # Architecture
//!
//! - **`feed`** - Change feed consumer, classifier, backoff supervisor
//! - **`realtime`** - Subscriber registry, notifier, WebSocket handler
//! - **`store`** - MongoDB change streams and owner lookups
//! - **`server`** - Server initialization, application state
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── feed/           - Change feed pipeline
//! ├── realtime/       - Subscriber fan-out
//! ├── store/          - MongoDB adapter
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! └── error/          - Error types
//! ```
//!
//! # Concurrency
//!
//! The supervisor runs in its own task and never blocks request handling.
//! Each WebSocket connection runs a reader and a writer task. Subscribers
//! have bounded queues; a slow one loses notifications instead of stalling
//! the feed.

/// Change feed pipeline
pub mod feed;

/// Real-time delivery
pub mod realtime;

/// MongoDB adapter
pub mod store;

/// Server setup and state
pub mod server;

/// Route configuration
pub mod routes;

/// Backend error types
pub mod error;

/// Re-export commonly used types
pub use error::{BackendError, ClassifyError, DeliveryError, FeedError};
pub use feed::{ConsumerState, LivePipeline};
pub use realtime::{ChannelRegistry, Notifier};
pub use server::create_app;
pub use store::MongoStore;
