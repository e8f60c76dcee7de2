/**
 * Live Notification Types
 *
 * This module defines the notifications produced by the classifier, the
 * audience they are addressed to, and the JSON frames exchanged with
 * WebSocket clients.
 *
 * # Wire Format
 *
 * Server pushed frames:
 * ```json
 * {"event":"serviceRequestUpdated","data":{...},"timestamp":"2026-01-01T00:00:00Z"}
 * ```
 *
 * Client frames:
 * ```json
 * {"op":"join","room":"64f0c2..."}
 * {"op":"leave","room":"64f0c2..."}
 * ```
 */
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::error::SharedError;

/// Semantic type of a notification
///
/// Serialized as its bare event name so clients can dispatch on it directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    /// A service request owned by a room changed
    ServiceRequestUpdated,
    /// A provider's service catalog changed
    ServicesUpdated,
    /// Protocol error reported back to a client
    Error,
    /// Any other event name
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ServiceRequestUpdated => "serviceRequestUpdated",
            Self::ServicesUpdated => "servicesUpdated",
            Self::Error => "error",
            Self::Custom(name) => name.as_str(),
        }
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "serviceRequestUpdated" => Self::ServiceRequestUpdated,
            "servicesUpdated" => Self::ServicesUpdated,
            "error" => Self::Error,
            _ => Self::Custom(name),
        }
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        event_type.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an addressable group of subscribers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Audience of a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationTarget {
    /// Subscribers currently joined to the room
    Room(RoomId),
    /// Every connected subscriber
    Broadcast,
}

/// Classified notification content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub kind: EventType,
    /// Forwarded to clients verbatim
    pub data: serde_json::Value,
}

impl NotificationPayload {
    pub fn new(kind: EventType, data: serde_json::Value) -> Self {
        Self { kind, data }
    }

    pub fn service_request_updated(request: serde_json::Value) -> Self {
        Self::new(EventType::ServiceRequestUpdated, request)
    }

    pub fn services_updated(entries: serde_json::Value) -> Self {
        Self::new(EventType::ServicesUpdated, entries)
    }
}

/// Frame pushed to a WebSocket client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    /// Event name
    pub event: EventType,
    /// Event payload
    pub data: serde_json::Value,
    /// Time the frame was created (RFC 3339)
    pub timestamp: String,
}

impl RealtimeEvent {
    pub fn new(event: EventType, data: serde_json::Value) -> Self {
        Self {
            event,
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Error frame answering a bad client message
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            EventType::Error,
            serde_json::json!({ "message": message.into() }),
        )
    }

    /// Encode as a text frame
    pub fn to_json(&self) -> Result<String, SharedError> {
        serde_json::to_string(self).map_err(SharedError::from)
    }
}

impl From<NotificationPayload> for RealtimeEvent {
    fn from(payload: NotificationPayload) -> Self {
        Self::new(payload.kind, payload.data)
    }
}

/// Operation sent by a WebSocket client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientCommand {
    Join { room: RoomId },
    Leave { room: RoomId },
}
