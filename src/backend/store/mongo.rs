use futures_util::StreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{CommandError, Error as MongoError, ErrorKind};
use mongodb::options::{ChangeStreamOptions, FindOneOptions, ReadPreference, SelectionCriteria};
use mongodb::{Client, Database};
use serde_json::Value;

use crate::backend::error::FeedError;
use crate::backend::feed::{ChangeSource, FeedStream, OwnerLookup};
use crate::backend::store::decode::{decode_event, document_key_of, document_to_json, driver_token};
use crate::shared::{DocumentId, ResumeToken};

/// Server codes that mean change streams cannot work on this deployment
///
/// - 40573: change streams are only supported on replica sets
/// - 40324: unrecognized pipeline stage `$changeStream`
/// - 280: the change stream cannot continue
const FATAL_COMMAND_CODES: &[i32] = &[40573, 40324, 280];

/// Server codes that reject a `resumeAfter` position
///
/// - 260: InvalidResumeToken
/// - 280: ChangeStreamFatalError, raised for tokens the server cannot use
/// - 286: ChangeStreamHistoryLost
const RESUME_LOST_CODES: &[i32] = &[260, 280, 286];

/// Explicitly owned MongoDB handle
#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
    database: Database,
}

impl MongoStore {
    /// Create a client for `uri`
    ///
    /// Only the connection string is checked here; servers are reached lazily
    /// by the first feed open, where failures fall under the reconnect policy.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, FeedError> {
        let client = Client::with_uri_str(uri).await.map_err(classify_error)?;
        let database = client.database(database);

        tracing::info!("[Store] Client ready for database {}", database.name());
        Ok(Self { client, database })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Shut the client down, waiting for outstanding cursors to be dropped
    pub async fn close(&self) {
        self.client.clone().shutdown().await;
        tracing::info!("[Store] Connection closed");
    }
}

impl ChangeSource for MongoStore {
    async fn watch(
        &self,
        collection: &str,
        resume_token: Option<ResumeToken>,
    ) -> Result<FeedStream, FeedError> {
        let mut options = ChangeStreamOptions::default();
        options.resume_after = resume_token.as_ref().and_then(driver_token);
        let resuming = options.resume_after.is_some();

        let stream = self
            .database
            .collection::<Document>(collection)
            .watch()
            .with_options(options)
            .await
            .map_err(|e| classify_open_error(e, resuming))?
            .with_type::<Document>();

        Ok(stream
            .filter_map(|event| async move {
                match event {
                    Ok(event) => decode_event(event).map(Ok),
                    Err(e) => Some(Err(classify_error(e))),
                }
            })
            .boxed())
    }

    async fn close(&self) {
        MongoStore::close(self).await
    }
}

impl OwnerLookup for MongoStore {
    async fn find_document(&self, collection: &str, id: &DocumentId) -> Result<Option<Value>, FeedError> {
        let mut options = FindOneOptions::default();
        options.selection_criteria = Some(SelectionCriteria::ReadPreference(ReadPreference::Primary));

        let document = self
            .database
            .collection::<Document>(collection)
            .find_one(doc! { "_id": document_key_of(id) })
            .with_options(options)
            .await
            .map_err(classify_error)?;

        Ok(document.as_ref().map(document_to_json))
    }
}

/// Classify a failed feed open
///
/// A rejected resume position is reported as [`FeedError::ResumeLost`] so the
/// consumer retries from the present instead of degrading.
pub fn classify_open_error(err: MongoError, resuming: bool) -> FeedError {
    match err.kind.as_ref() {
        ErrorKind::Command(CommandError { code, .. }) if resuming && rejects_resume(*code) => {
            FeedError::resume_lost(err.to_string())
        }
        _ => classify_error(err),
    }
}

/// Whether a server code means the supplied resume position is unusable
pub fn rejects_resume(code: i32) -> bool {
    RESUME_LOST_CODES.contains(&code)
}

/// Split driver errors into retryable and permanent failures
pub fn classify_error(err: MongoError) -> FeedError {
    match err.kind.as_ref() {
        ErrorKind::Command(CommandError { code, .. }) if FATAL_COMMAND_CODES.contains(code) => {
            FeedError::fatal(err.to_string())
        }
        ErrorKind::Authentication { .. } | ErrorKind::InvalidArgument { .. } => {
            FeedError::fatal(err.to_string())
        }
        _ => FeedError::transient(err.to_string()),
    }
}
