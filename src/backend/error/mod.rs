//! Backend Error Module
//!
//! Error types of the live pipeline and the HTTP surface.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - IntoResponse for BackendError
//! ```
//!
//! # Error Types
//!
//! - `FeedError` - Transient or fatal change feed failures
//! - `ClassifyError` - Owner lookup misses and failures
//! - `DeliveryError` - A subscriber's channel is closed
//! - `BackendError` - Errors returned by HTTP handlers
//!
//! None of these terminate the process: the worst outcome is a degraded
//! pipeline with the HTTP surface still serving.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::{BackendError, ClassifyError, DeliveryError, FeedError};
