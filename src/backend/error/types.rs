/**
 * Backend Error Types
 *
 * This module defines the error types of the live-update pipeline and of
 * the HTTP surface around it.
 *
 * # Error Categories
 *
 * ## Feed Errors
 *
 * Raised while opening or reading the change feed:
 * - `Transient` - network or session loss; the supervisor retries
 * - `ResumeLost` - the stored position is gone; retried from the present
 * - `Fatal` - the feed cannot be established at all; the pipeline degrades
 *
 * ## Classification Errors
 *
 * - `LookupMiss` - the owning document could not be found; the event is dropped
 * - `Lookup` - the lookup itself failed
 *
 * ## Delivery Errors
 *
 * A single subscriber's queue is closed; that subscriber is removed.
 *
 * ## Handler Errors
 *
 * `BackendError` is returned by HTTP handlers and converts into a JSON
 * response (see `conversion`). Handlers pick the status code themselves.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::realtime::registry::SubscriberId;
use crate::shared::DocumentId;

/// Change feed failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Network or session loss; retry, resuming from the last position
    #[error("Transient feed error: {message}")]
    Transient {
        /// Human-readable error message
        message: String,
    },

    /// The store can no longer resume from the supplied position
    #[error("Resume position lost: {message}")]
    ResumeLost {
        /// Human-readable error message
        message: String,
    },

    /// The feed primitive is unusable; never retried
    #[error("Fatal feed error: {message}")]
    Fatal {
        /// Human-readable error message
        message: String,
    },
}

impl FeedError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn resume_lost(message: impl Into<String>) -> Self {
        Self::ResumeLost {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn is_resume_lost(&self) -> bool {
        matches!(self, Self::ResumeLost { .. })
    }
}

/// Failure to classify a change record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassifyError {
    /// No owning document matched the record's identity
    #[error("No owning document found for {0}")]
    LookupMiss(DocumentId),

    /// The owner lookup could not be performed
    #[error("Owner lookup failed: {0}")]
    Lookup(#[from] FeedError),
}

/// A subscriber's channel is broken
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Delivery to subscriber {subscriber} failed: channel closed")]
pub struct DeliveryError {
    pub subscriber: SubscriberId,
}

/// Backend-specific error types
///
/// Returned from HTTP handlers and converted into a JSON response.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (e.g., unknown room, invalid request)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
        }
    }
}
