//! In-process remote document store
//!
//! Implements [`RemoteCollectionClient`] over a map of collections, pushing a
//! full snapshot to every live subscriber whenever a collection changes. It
//! backs the CLI (via [`super::json_file`]) and the test suites, so it also
//! carries fault and latency injection:
//!
//! - `stale_first_snapshot`: new subscriptions first see an empty collection,
//!   like a local cache that has not synced yet
//! - `fail_subscriptions` / `reject_next_subscribe`: push channel failures
//! - `fail_next_query`: point query failures
//! - `hold_queries` / `release_queries`: keep point queries in flight

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};

use crate::domain::result::{Error, Result};
use crate::domain::{CollectionPath, Document};
use crate::ports::{RemoteCollectionClient, SnapshotEvent, Subscription};

/// Behaviour switches for [`MemoryStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreOptions {
    /// Deliver an empty snapshot as the first push of every subscription
    pub stale_first_snapshot: bool,
}

/// Serializable contents of a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDump {
    #[serde(default)]
    pub collections: BTreeMap<CollectionPath, Vec<Document>>,
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<SnapshotEvent>,
}

#[derive(Default)]
struct Inner {
    collections: BTreeMap<CollectionPath, Vec<Document>>,
    subscribers: HashMap<CollectionPath, Vec<Subscriber>>,
    next_subscriber_id: u64,
    failing_queries: HashMap<CollectionPath, VecDeque<String>>,
    rejected_subscribes: HashMap<CollectionPath, VecDeque<String>>,
    query_gates: HashMap<CollectionPath, Arc<Semaphore>>,
    query_counts: HashMap<CollectionPath, usize>,
}

impl Inner {
    fn broadcast(&mut self, path: &CollectionPath) {
        let docs = self.collections.get(path).cloned().unwrap_or_default();
        if let Some(subscribers) = self.subscribers.get_mut(path) {
            subscribers.retain(|s| s.tx.send(SnapshotEvent::Snapshot(docs.clone())).is_ok());
        }
    }
}

/// In-memory implementation of the remote collection port
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    options: MemoryStoreOptions,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: MemoryStoreOptions) -> Self {
        Self {
            inner: Arc::default(),
            options,
        }
    }

    /// Build a store from previously dumped contents
    pub fn from_dump(dump: StoreDump, options: MemoryStoreOptions) -> Self {
        let store = Self::with_options(options);
        store.lock().collections = dump.collections;
        store
    }

    /// Snapshot every collection for persistence
    pub fn dump(&self) -> StoreDump {
        StoreDump {
            collections: self.lock().collections.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the maps half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current documents of a collection, in arrival order
    pub fn documents(&self, path: &CollectionPath) -> Vec<Document> {
        self.lock().collections.get(path).cloned().unwrap_or_default()
    }

    /// Number of live subscriptions on a collection
    pub fn subscriber_count(&self, path: &CollectionPath) -> usize {
        self.lock().subscribers.get(path).map_or(0, Vec::len)
    }

    /// Number of point queries issued against a collection
    pub fn query_count(&self, path: &CollectionPath) -> usize {
        self.lock().query_counts.get(path).copied().unwrap_or(0)
    }

    /// Terminate every subscription on `path` with an error event
    pub fn fail_subscriptions(&self, path: &CollectionPath, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.lock();
        if let Some(subscribers) = inner.subscribers.remove(path) {
            for s in subscribers {
                let _ = s.tx.send(SnapshotEvent::Error(message.clone()));
            }
        }
    }

    /// Make the next `subscribe` on `path` fail
    pub fn reject_next_subscribe(&self, path: &CollectionPath, message: impl Into<String>) {
        self.lock()
            .rejected_subscribes
            .entry(path.clone())
            .or_default()
            .push_back(message.into());
    }

    /// Make the next point query on `path` fail
    pub fn fail_next_query(&self, path: &CollectionPath, message: impl Into<String>) {
        self.lock()
            .failing_queries
            .entry(path.clone())
            .or_default()
            .push_back(message.into());
    }

    /// Keep point queries on `path` pending until [`Self::release_queries`]
    pub fn hold_queries(&self, path: &CollectionPath) {
        self.lock()
            .query_gates
            .entry(path.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(0)));
    }

    /// Let held queries on `path` complete
    pub fn release_queries(&self, path: &CollectionPath) {
        if let Some(gate) = self.lock().query_gates.remove(path) {
            gate.close();
        }
    }

    /// Write a document without going through the async port
    pub fn insert(&self, path: &CollectionPath, document: Document) {
        let mut inner = self.lock();
        let docs = inner.collections.entry(path.clone()).or_default();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document,
            None => docs.push(document),
        }
        inner.broadcast(path);
    }

    /// Remove a document, returning whether it existed
    pub fn remove(&self, path: &CollectionPath, id: &str) -> bool {
        let mut inner = self.lock();
        let removed = match inner.collections.get_mut(path) {
            Some(docs) => {
                let before = docs.len();
                docs.retain(|d| d.id != id);
                docs.len() != before
            }
            None => false,
        };
        if removed {
            inner.broadcast(path);
        }
        removed
    }
}

#[async_trait]
impl RemoteCollectionClient for MemoryStore {
    async fn query(&self, path: &CollectionPath) -> Result<Vec<Document>> {
        let gate = {
            let mut inner = self.lock();
            *inner.query_counts.entry(path.clone()).or_default() += 1;
            inner.query_gates.get(path).cloned()
        };

        if let Some(gate) = gate {
            // Resolves once the gate is closed by `release_queries`
            let _ = gate.acquire().await;
        }

        let mut inner = self.lock();
        if let Some(message) = inner
            .failing_queries
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return Err(Error::store(message));
        }
        Ok(inner.collections.get(path).cloned().unwrap_or_default())
    }

    async fn subscribe(&self, path: &CollectionPath) -> Result<Subscription> {
        let mut inner = self.lock();

        if let Some(message) = inner
            .rejected_subscribes
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return Err(Error::subscription(message));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let initial = if self.options.stale_first_snapshot {
            Vec::new()
        } else {
            inner.collections.get(path).cloned().unwrap_or_default()
        };
        // The receiver is alive, so the first push cannot fail
        let _ = tx.send(SnapshotEvent::Snapshot(initial));

        let id = inner.next_subscriber_id;
        inner.next_subscriber_id += 1;
        inner
            .subscribers
            .entry(path.clone())
            .or_default()
            .push(Subscriber { id, tx });

        let registry = Arc::downgrade(&self.inner);
        let path = path.clone();
        Ok(Subscription::new(rx, move || {
            if let Some(registry) = registry.upgrade() {
                let mut inner = registry.lock().unwrap_or_else(|p| p.into_inner());
                if let Some(subscribers) = inner.subscribers.get_mut(&path) {
                    subscribers.retain(|s| s.id != id);
                }
            }
        }))
    }

    async fn upsert(&self, path: &CollectionPath, document: Document) -> Result<()> {
        if document.id.trim().is_empty() {
            return Err(Error::validation("document id cannot be empty"));
        }
        self.insert(path, document);
        Ok(())
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<()> {
        self.remove(path, id);
        Ok(())
    }
}
