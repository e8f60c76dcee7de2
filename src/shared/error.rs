//! Shared Error Types
//!
//! Errors raised while handling the data types in [`crate::shared`]:
//! encoding frames and decoding client commands.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON encoding/decoding failures
//! - `ProtocolError` - A client frame that is not a valid command
//!
//! # Usage
//!
//! ```rust
//! use roadrescue_live::shared::error::SharedError;
//!
//! let error = SharedError::protocol("unsupported binary frame");
//! assert!(error.to_string().contains("binary"));
//! ```
use thiserror::Error;

/// Errors shared across the crate
#[derive(Debug, Error, Clone)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Malformed client frame
    #[error("Protocol error: {message}")]
    ProtocolError {
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
