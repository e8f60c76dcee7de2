//! Change Records
//!
//! Store-agnostic representation of a single mutation observed on the
//! watched collection. The store adapter decodes its native change events
//! into [`ChangeRecord`] so that classification and fan-out never depend on
//! driver types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of mutation carried by a change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Update,
    Replace,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Opaque identity of a document in the watched collection
///
/// Object ids are carried as their hex form; other key types use their
/// canonical string rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque feed position marker
///
/// Held as extended JSON so it can be logged, persisted or handed back to the
/// store adapter without the pipeline knowing its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResumeToken(pub serde_json::Value);

/// A normalized mutation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub operation: OperationKind,
    pub document_id: DocumentId,
    /// Dot-delimited field paths touched by an update. Empty for every other
    /// operation.
    pub changed_paths: BTreeSet<String>,
    /// New values keyed by path; a path listed in `changed_paths` may be
    /// absent here when the field was removed.
    pub changed_values: BTreeMap<String, serde_json::Value>,
    pub full_document: Option<serde_json::Value>,
}

impl ChangeRecord {
    pub fn insert(document_id: DocumentId, document: serde_json::Value) -> Self {
        Self {
            operation: OperationKind::Insert,
            document_id,
            changed_paths: BTreeSet::new(),
            changed_values: BTreeMap::new(),
            full_document: Some(document),
        }
    }

    pub fn replace(document_id: DocumentId, document: serde_json::Value) -> Self {
        Self {
            operation: OperationKind::Replace,
            ..Self::insert(document_id, document)
        }
    }

    pub fn delete(document_id: DocumentId) -> Self {
        Self {
            operation: OperationKind::Delete,
            document_id,
            changed_paths: BTreeSet::new(),
            changed_values: BTreeMap::new(),
            full_document: None,
        }
    }

    /// Build an update record from the set fields and removed paths of an
    /// update description.
    pub fn update(
        document_id: DocumentId,
        updated: impl IntoIterator<Item = (String, serde_json::Value)>,
        removed: impl IntoIterator<Item = String>,
    ) -> Self {
        let changed_values: BTreeMap<_, _> = updated.into_iter().collect();
        let mut changed_paths: BTreeSet<String> = changed_values.keys().cloned().collect();
        changed_paths.extend(removed);

        Self {
            operation: OperationKind::Update,
            document_id,
            changed_paths,
            changed_values,
            full_document: None,
        }
    }

    /// Attach a post-image snapshot
    pub fn with_full_document(mut self, document: serde_json::Value) -> Self {
        self.full_document = Some(document);
        self
    }
}

/// A decoded record together with the feed position just after it
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub record: ChangeRecord,
    pub resume_token: Option<ResumeToken>,
}

/// Returns true when `path` equals `prefix` or lies underneath it.
///
/// Matching is per path segment: `services` covers `services.2.price` but not
/// `servicesArchive`.
pub fn path_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
