//! Event Classification
//!
//! Maps a [`ChangeRecord`] to at most one notification and its audience.
//! Which field paths matter is described by a small declarative table of
//! `(prefix → rule)` entries, evaluated in order:
//!
//! | Prefix (default)  | Rule         | Event                   | Target        |
//! |-------------------|--------------|-------------------------|---------------|
//! | `serviceRequests` | `RoomScoped` | `serviceRequestUpdated` | owner's room  |
//! | `services`        | `Catalog`    | `servicesUpdated`       | broadcast     |
//!
//! Updates carry no owner information, so both rules read the owning
//! document once through [`OwnerLookup`]. Inserts and replaces carry the
//! full document and need no lookup. Deletes never notify.

use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;

use crate::backend::error::{ClassifyError, FeedError};
use crate::shared::change::path_under;
use crate::shared::{
    ChangeRecord, DocumentId, LiveConfig, NotificationPayload, NotificationTarget, OperationKind,
    RoomId,
};

/// Point-in-time read of a document in the watched collection
pub trait OwnerLookup: Send + Sync + 'static {
    /// Fetch the document with `id`, observing every write that was already
    /// visible on the change feed.
    fn find_document(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Option<Value>, FeedError>> + Send;
}

/// How a matched prefix is turned into a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Deliver the changed record to the owner's room
    RoomScoped,
    /// Broadcast the changed catalog entries
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRule {
    pub prefix: String,
    pub kind: RuleKind,
}

impl ClassifierRule {
    pub fn new(prefix: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            prefix: prefix.into(),
            kind,
        }
    }
}

/// First rule matching a record, with the paths it matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    pub rule: &'a ClassifierRule,
    pub paths: Vec<&'a str>,
}

/// Ordered prefix rules plus the document fields they read
#[derive(Debug, Clone)]
pub struct ClassificationTable {
    rules: Vec<ClassifierRule>,
    owner_field: String,
    display_name_field: String,
}

impl ClassificationTable {
    pub fn new(
        rules: Vec<ClassifierRule>,
        owner_field: impl Into<String>,
        display_name_field: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            owner_field: owner_field.into(),
            display_name_field: display_name_field.into(),
        }
    }

    pub fn from_config(config: &LiveConfig) -> Self {
        Self::new(
            vec![
                ClassifierRule::new(&config.room_prefix, RuleKind::RoomScoped),
                ClassifierRule::new(&config.catalog_prefix, RuleKind::Catalog),
            ],
            &config.owner_field,
            &config.display_name_field,
        )
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// First rule whose prefix covers one of the update's changed paths
    pub fn match_update<'a>(&'a self, record: &'a ChangeRecord) -> Option<RuleMatch<'a>> {
        self.rules.iter().find_map(|rule| {
            let paths: Vec<&str> = record
                .changed_paths
                .iter()
                .map(String::as_str)
                .filter(|path| path_under(path, &rule.prefix))
                .collect();
            (!paths.is_empty()).then_some(RuleMatch { rule, paths })
        })
    }

    /// First rule whose prefix holds a non-empty value in `document`
    pub fn match_document(&self, document: &Value) -> Option<&ClassifierRule> {
        self.rules
            .iter()
            .find(|rule| value_at(document, &rule.prefix).is_some_and(has_content))
    }

    fn owner_of(&self, document: &Value) -> Option<RoomId> {
        value_at(document, &self.owner_field)
            .and_then(identity_of)
            .map(RoomId::new)
    }

    fn display_name_of(&self, document: &Value) -> Value {
        value_at(document, &self.display_name_field)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Classifier of change records
pub struct EventClassifier<L> {
    table: ClassificationTable,
    lookup: Arc<L>,
    collection: String,
}

impl<L: OwnerLookup> EventClassifier<L> {
    pub fn new(table: ClassificationTable, lookup: Arc<L>, collection: impl Into<String>) -> Self {
        Self {
            table,
            lookup,
            collection: collection.into(),
        }
    }

    pub fn table(&self) -> &ClassificationTable {
        &self.table
    }

    /// Classify one record
    ///
    /// `Ok(None)` means the record is not interesting. Lookup misses are
    /// reported as `ClassifyError::LookupMiss` so the caller can log the drop.
    pub async fn classify(
        &self,
        record: &ChangeRecord,
    ) -> Result<Option<(NotificationPayload, NotificationTarget)>, ClassifyError> {
        match record.operation {
            OperationKind::Delete => Ok(None),
            OperationKind::Insert | OperationKind::Replace => {
                Ok(record.full_document.as_ref().and_then(|document| {
                    self.classify_document(&record.document_id, document)
                }))
            }
            OperationKind::Update => self.classify_update(record).await,
        }
    }

    async fn classify_update(
        &self,
        record: &ChangeRecord,
    ) -> Result<Option<(NotificationPayload, NotificationTarget)>, ClassifyError> {
        let Some(matched) = self.table.match_update(record) else {
            return Ok(None);
        };

        let document = self
            .lookup
            .find_document(&self.collection, &record.document_id)
            .await?
            .ok_or_else(|| ClassifyError::LookupMiss(record.document_id.clone()))?;
        let owner = self
            .table
            .owner_of(&document)
            .ok_or_else(|| ClassifyError::LookupMiss(record.document_id.clone()))?;

        let prefix = matched.rule.prefix.as_str();
        let classified = match matched.rule.kind {
            RuleKind::RoomScoped => {
                // Several paths of one request may change together; the first
                // names the record.
                let path = matched.paths[0];
                resolve_record(&document, record, prefix, path).map(|request| {
                    (
                        NotificationPayload::service_request_updated(request),
                        NotificationTarget::Room(owner),
                    )
                })
            }
            RuleKind::Catalog => {
                let entries = changed_entries(&document, record, prefix, &matched.paths);
                // A catalog emptied as a whole is still news.
                let whole = matched.paths.iter().any(|path| *path == prefix);
                (whole || !entries.is_empty()).then(|| {
                    (
                        self.catalog_payload(&owner, &document, entries),
                        NotificationTarget::Broadcast,
                    )
                })
            }
        };
        Ok(classified)
    }

    fn classify_document(
        &self,
        id: &DocumentId,
        document: &Value,
    ) -> Option<(NotificationPayload, NotificationTarget)> {
        let rule = self.table.match_document(document)?;
        let owner = match self.table.owner_of(document) {
            Some(owner) => owner,
            None => {
                tracing::debug!("[Classifier] Document {} has no owner field, skipping", id);
                return None;
            }
        };
        let value = value_at(document, &rule.prefix)?;

        match rule.kind {
            RuleKind::RoomScoped => {
                let request = match value {
                    Value::Array(items) => items.last()?.clone(),
                    other => other.clone(),
                };
                Some((
                    NotificationPayload::service_request_updated(request),
                    NotificationTarget::Room(owner),
                ))
            }
            RuleKind::Catalog => {
                let entries = match value {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                };
                Some((
                    self.catalog_payload(&owner, document, entries),
                    NotificationTarget::Broadcast,
                ))
            }
        }
    }

    fn catalog_payload(&self, owner: &RoomId, document: &Value, entries: Vec<Value>) -> NotificationPayload {
        NotificationPayload::services_updated(json!([{
            "id": owner.as_str(),
            "name": self.table.display_name_of(document),
            "services": entries,
        }]))
    }
}

/// The record a changed path belongs to, e.g. `serviceRequests.2` for
/// `serviceRequests.2.status`. A change of the whole prefix names its newest
/// element.
fn resolve_record(document: &Value, record: &ChangeRecord, prefix: &str, path: &str) -> Option<Value> {
    let element_path = element_path(prefix, path);
    match element_path {
        Some(element_path) => value_at(document, &element_path)
            .or_else(|| record.changed_values.get(path))
            .cloned(),
        None => {
            let value = value_at(document, prefix).or_else(|| record.changed_values.get(path))?;
            match value {
                Value::Array(items) => items.last().cloned(),
                other => Some(other.clone()),
            }
        }
    }
}

/// Complete catalog entries touched by the changed paths, without repeats
fn changed_entries(document: &Value, record: &ChangeRecord, prefix: &str, paths: &[&str]) -> Vec<Value> {
    let mut seen = Vec::new();
    let mut entries = Vec::new();

    for path in paths {
        match element_path(prefix, path) {
            Some(element_path) => {
                if seen.contains(&element_path) {
                    continue;
                }
                let entry = value_at(document, &element_path).or_else(|| record.changed_values.get(*path));
                if let Some(entry) = entry {
                    entries.push(entry.clone());
                }
                seen.push(element_path);
            }
            None => {
                let value = record.changed_values.get(*path).or_else(|| value_at(document, prefix));
                match value {
                    Some(Value::Array(items)) => entries.extend(items.iter().cloned()),
                    Some(other) => entries.push(other.clone()),
                    None => {}
                }
            }
        }
    }
    entries
}

/// `prefix.<first segment>` for paths below the prefix
fn element_path(prefix: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix(prefix)?.strip_prefix('.')?;
    let segment = rest.split('.').next()?;
    Some(format!("{}.{}", prefix, segment))
}

/// Resolve a dot-delimited path through objects and arrays
pub fn value_at<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Render an identity value as a room name
///
/// Accepts strings, numbers and extended-JSON object ids (`{"$oid": ".."}`).
pub fn identity_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}
