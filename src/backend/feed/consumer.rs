//! Change Feed Consumer
//!
//! Holds the single subscription to one collection's change feed and yields
//! its records in emission order. The consumer remembers the resume token of
//! the last record it handed out so a reopened feed continues from there.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use std::future::Future;
use std::sync::Arc;

use crate::backend::error::FeedError;
use crate::shared::{ChangeRecord, FeedItem, ResumeToken};

/// One element of a raw feed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Record(FeedItem),
    /// The feed can no longer continue from its current position
    Invalidated,
}

/// Raw change feed as produced by a store adapter
pub type FeedStream = BoxStream<'static, Result<FeedEvent, FeedError>>;

/// A store that can watch a collection for changes
pub trait ChangeSource: Send + Sync + 'static {
    /// Open a change feed on `collection`, continuing after `resume_token`
    /// when one is given.
    fn watch(
        &self,
        collection: &str,
        resume_token: Option<ResumeToken>,
    ) -> impl Future<Output = Result<FeedStream, FeedError>> + Send;

    /// Release the store handle
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Consumer of one collection's change feed
pub struct ChangeFeedConsumer<S> {
    source: Arc<S>,
    collection: String,
    resume_token: Option<ResumeToken>,
    stream: Option<FeedStream>,
}

impl<S: ChangeSource> ChangeFeedConsumer<S> {
    pub fn new(source: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            source,
            collection: collection.into(),
            resume_token: None,
            stream: None,
        }
    }

    /// Start from a previously observed position
    pub fn with_resume_token(mut self, token: ResumeToken) -> Self {
        self.resume_token = Some(token);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn resume_token(&self) -> Option<&ResumeToken> {
        self.resume_token.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Open (or reopen) the feed from the last observed position
    ///
    /// When the store rejects that position the token is discarded, so the
    /// next attempt starts from the present.
    pub async fn open(&mut self) -> Result<(), FeedError> {
        self.close();
        let opened = self
            .source
            .watch(&self.collection, self.resume_token.clone())
            .await;
        let stream = match opened {
            Ok(stream) => stream,
            Err(err) if err.is_resume_lost() && self.resume_token.is_some() => {
                tracing::warn!(
                    "[Feed] Resume position on {} rejected ({}), restarting from now",
                    self.collection,
                    err
                );
                self.resume_token = None;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        tracing::info!(
            "[Feed] Watching {} ({})",
            self.collection,
            if self.resume_token.is_some() { "resumed" } else { "from now" }
        );
        self.stream = Some(stream);
        Ok(())
    }

    /// Next record of the open feed
    ///
    /// Returns `None` once the feed has ended (or was never opened) and
    /// `Some(Err(_))` when it broke; either way the subscription is released.
    pub async fn next(&mut self) -> Option<Result<ChangeRecord, FeedError>> {
        let stream = self.stream.as_mut()?;
        let event = stream.next().await;
        match event {
            Some(Ok(FeedEvent::Record(item))) => {
                if let Some(token) = item.resume_token {
                    self.resume_token = Some(token);
                }
                Some(Ok(item.record))
            }
            Some(Ok(FeedEvent::Invalidated)) => {
                tracing::warn!("[Feed] Feed on {} invalidated, resume position cleared", self.collection);
                self.resume_token = None;
                self.close();
                None
            }
            Some(Err(err)) => {
                self.close();
                Some(Err(err))
            }
            None => {
                self.close();
                None
            }
        }
    }

    /// Release the subscription
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!("[Feed] Closed feed on {}", self.collection);
        }
    }
}
