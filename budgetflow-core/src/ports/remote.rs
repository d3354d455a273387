//! Remote collection port - the opaque document store the sync layer mirrors

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::result::Result;
use crate::domain::{CollectionPath, Document};

/// An event delivered on a push channel
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// Full contents of the collection. May be empty even when the remote
    /// collection is not, e.g. while a local cache has not synced yet.
    Snapshot(Vec<Document>),
    /// The channel failed. No further events follow.
    Error(String),
}

/// A live push channel for one collection.
///
/// Dropping the handle unsubscribes, so the subscription cannot outlive the
/// owner on any exit path.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<SnapshotEvent>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap an event receiver together with the store's unsubscribe hook
    pub fn new(
        events: mpsc::UnboundedReceiver<SnapshotEvent>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            cancel: Some(Box::new(on_cancel)),
        }
    }

    /// Next pushed event, or `None` once the channel has terminated
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.events.recv().await
    }

    /// Explicitly tear the subscription down
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Remote document store abstraction
///
/// Implementations (adapters) provide the actual transport. Paths are fully
/// scoped, e.g. `users/{userId}/bankAccounts/{bankAccountId}/incomes`.
#[async_trait]
pub trait RemoteCollectionClient: Send + Sync {
    /// One-shot read of every document currently in the collection
    async fn query(&self, path: &CollectionPath) -> Result<Vec<Document>>;

    /// Open a push channel that delivers the full collection on every change
    async fn subscribe(&self, path: &CollectionPath) -> Result<Subscription>;

    /// Create or replace a document
    async fn upsert(&self, path: &CollectionPath, document: Document) -> Result<()>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<()>;
}
