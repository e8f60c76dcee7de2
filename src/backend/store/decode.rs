//! Change event decoding
//!
//! Reads raw change stream documents (`operationType`, `documentKey`,
//! `updateDescription`, `fullDocument`, `_id`) into [`FeedEvent`]s. Values
//! are converted to relaxed extended JSON, so object ids appear as
//! `{"$oid": ".."}` and plain numbers stay numbers.

use mongodb::bson::{oid::ObjectId, Bson, Document};
use mongodb::change_stream::event::ResumeToken as DriverToken;
use serde_json::Value;

use crate::backend::feed::FeedEvent;
use crate::shared::{ChangeRecord, DocumentId, FeedItem, OperationKind, ResumeToken};

/// Decode one raw change event
///
/// Returns `None` for events that carry no document mutation (`drop`,
/// `rename`, ...) and for malformed events, which are logged and skipped.
pub fn decode_event(event: Document) -> Option<FeedEvent> {
    let operation = match event.get_str("operationType") {
        Ok(operation) => operation,
        Err(_) => {
            tracing::warn!("[Feed] Skipping change event without operationType");
            return None;
        }
    };

    let kind = match operation {
        "insert" => OperationKind::Insert,
        "update" => OperationKind::Update,
        "replace" => OperationKind::Replace,
        "delete" => OperationKind::Delete,
        "invalidate" => return Some(FeedEvent::Invalidated),
        other => {
            tracing::debug!("[Feed] Ignoring {} event", other);
            return None;
        }
    };

    let Some(document_id) = event
        .get_document("documentKey")
        .ok()
        .and_then(|key| key.get("_id"))
        .map(document_id_of)
    else {
        tracing::warn!("[Feed] Skipping {} event without documentKey", kind);
        return None;
    };

    let full_document = event.get_document("fullDocument").ok().map(document_to_json);

    let record = match kind {
        OperationKind::Insert | OperationKind::Replace => {
            let Some(document) = full_document else {
                tracing::warn!("[Feed] Skipping {} event for {} without fullDocument", kind, document_id);
                return None;
            };
            if kind == OperationKind::Insert {
                ChangeRecord::insert(document_id, document)
            } else {
                ChangeRecord::replace(document_id, document)
            }
        }
        OperationKind::Delete => ChangeRecord::delete(document_id),
        OperationKind::Update => {
            let description = event.get_document("updateDescription").ok();
            let updated = description
                .and_then(|d| d.get_document("updatedFields").ok())
                .map(|fields| {
                    fields
                        .iter()
                        .map(|(path, value)| (path.clone(), value.clone().into_relaxed_extjson()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            let mut removed = description
                .and_then(|d| d.get_array("removedFields").ok())
                .map(|paths| {
                    paths
                        .iter()
                        .filter_map(|path| path.as_str().map(String::from))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            // A truncated array lost its tail; report the array path itself.
            if let Some(truncated) = description.and_then(|d| d.get_array("truncatedArrays").ok()) {
                removed.extend(
                    truncated
                        .iter()
                        .filter_map(Bson::as_document)
                        .filter_map(|entry| entry.get_str("field").ok().map(String::from)),
                );
            }

            let record = ChangeRecord::update(document_id, updated, removed);
            match full_document {
                Some(document) => record.with_full_document(document),
                None => record,
            }
        }
    };

    let resume_token = event
        .get_document("_id")
        .ok()
        .map(|token| ResumeToken(document_to_json(token)));

    Some(FeedEvent::Record(FeedItem {
        record,
        resume_token,
    }))
}

/// Render a document key as a [`DocumentId`]
pub fn document_id_of(key: &Bson) -> DocumentId {
    match key {
        Bson::ObjectId(oid) => DocumentId::new(oid.to_hex()),
        Bson::String(s) => DocumentId::new(s.clone()),
        other => DocumentId::new(other.clone().into_relaxed_extjson().to_string()),
    }
}

/// `_id` value to look a [`DocumentId`] up by
pub fn document_key_of(id: &DocumentId) -> Bson {
    match ObjectId::parse_str(id.as_str()) {
        Ok(oid) => Bson::ObjectId(oid),
        Err(_) => Bson::String(id.as_str().to_string()),
    }
}

pub fn document_to_json(document: &Document) -> Value {
    Bson::Document(document.clone()).into_relaxed_extjson()
}

/// Convert a stored position back into the driver's token
///
/// An unreadable token yields `None` so the feed restarts from the present.
pub fn driver_token(token: &ResumeToken) -> Option<DriverToken> {
    let bson = match Bson::try_from(token.0.clone()) {
        Ok(bson) => bson,
        Err(e) => {
            tracing::warn!("[Feed] Discarding unreadable resume token: {}", e);
            return None;
        }
    };
    match mongodb::bson::from_bson(bson) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::warn!("[Feed] Discarding unreadable resume token: {}", e);
            None
        }
    }
}
