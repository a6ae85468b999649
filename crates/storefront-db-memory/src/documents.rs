//! In-memory [`DocumentStore`] with live queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::RwLock;
use serde_json::Value;
use storefront_storage::{
    Document, DocumentStore, DocumentStream, FieldPatch, Query, StorageError,
};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::broadcaster::{ChangeBroadcaster, ChangeEvent, ChangeKind};
use crate::query;

type Collection = HashMap<String, Value>;

#[derive(Debug, Default)]
struct Inner {
    collections: RwLock<HashMap<String, Collection>>,
    changes: ChangeBroadcaster,
    read_only: AtomicBool,
}

/// In-memory document store.
///
/// Cloning is cheap and every clone sees the same data. Live queries opened
/// with [`DocumentStore::watch`] re-run after each committed write to their
/// collection, which is how the remote store's push notifications behave.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Inner>,
}

impl MemoryDocumentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `records` into `collection` without announcing them.
    pub fn seed<I, K>(&self, collection: &str, records: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut guard = self.inner.collections.write();
        let target = guard.entry(collection.to_string()).or_default();
        for (key, record) in records {
            target.insert(key.into(), record);
        }
    }

    /// Number of records in `collection`.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .get(collection)
            .map_or(0, HashMap::len)
    }

    /// Returns true if `collection` has no records.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Rejects every later write with [`StorageError::PermissionDenied`]
    /// until switched back. Reads and live queries are unaffected.
    pub fn set_read_only(&self, read_only: bool) {
        self.inner.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_writable(&self, collection: &str) -> Result<(), StorageError> {
        if self.inner.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::permission_denied(format!(
                "{collection} is read-only"
            )));
        }
        Ok(())
    }

    /// Number of live queries currently attached.
    pub fn watcher_count(&self) -> usize {
        self.inner.changes.subscriber_count()
    }

    fn run_query(&self, collection: &str, q: &Query) -> Result<Vec<Document>, StorageError> {
        let guard = self.inner.collections.read();
        match guard.get(collection) {
            Some(records) => query::execute(q, records),
            None => {
                q.validate()?;
                Ok(Vec::new())
            }
        }
    }

    fn announce(&self, collection: &str, key: &str, kind: ChangeKind) {
        let count = self
            .inner
            .changes
            .send(ChangeEvent::new(collection, key, kind));
        debug!(
            collection = %collection,
            key = %key,
            kind = ?kind,
            watchers = count,
            "Committed write"
        );
    }
}

/// State carried between emissions of a live query.
struct LiveQuery {
    store: MemoryDocumentStore,
    collection: String,
    query: Query,
    changes: Option<broadcast::Receiver<ChangeEvent>>,
    finished: bool,
}

impl LiveQuery {
    /// Waits for the next write to the watched collection.
    ///
    /// Returns `false` once the store is gone.
    async fn changed(&self, changes: &mut broadcast::Receiver<ChangeEvent>) -> bool {
        loop {
            match changes.recv().await {
                Ok(event) if event.collection == self.collection => return true,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    trace!(skipped, collection = %self.collection, "Live query lagged, re-reading");
                    return true;
                }
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn watch(&self, collection: &str, query: &Query) -> DocumentStream {
        let initial = LiveQuery {
            store: self.clone(),
            collection: collection.to_string(),
            query: query.clone(),
            changes: None,
            finished: false,
        };

        stream::unfold(initial, |mut live| async move {
            if live.finished {
                return None;
            }
            // Subscribe before the first read so no write falls in between.
            let changes = match live.changes.take() {
                Some(mut changes) => {
                    if !live.changed(&mut changes).await {
                        return None;
                    }
                    changes
                }
                None => live.store.inner.changes.subscribe(),
            };
            live.changes = Some(changes);

            let result = live.store.run_query(&live.collection, &live.query);
            live.finished = result.is_err();
            Some((result, live))
        })
        .boxed()
    }

    async fn fetch(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError> {
        self.run_query(collection, query)
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .inner
            .collections
            .read()
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned())
    }

    async fn set(&self, collection: &str, key: &str, record: &Value) -> Result<(), StorageError> {
        self.check_writable(collection)?;
        if !record.is_object() {
            return Err(StorageError::invalid_record("record must be a JSON object"));
        }
        self.inner
            .collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), record.clone());
        self.announce(collection, key, ChangeKind::Set);
        Ok(())
    }

    async fn patch(
        &self,
        collection: &str,
        key: &str,
        patch: &FieldPatch,
    ) -> Result<(), StorageError> {
        self.check_writable(collection)?;
        {
            let mut guard = self.inner.collections.write();
            let record = guard
                .get_mut(collection)
                .and_then(|records| records.get_mut(key))
                .ok_or_else(|| StorageError::not_found(collection, key))?;
            let mut updated = record.clone();
            patch.apply_to(&mut updated)?;
            *record = updated;
        }
        self.announce(collection, key, ChangeKind::Patched);
        Ok(())
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        self.check_writable(collection)?;
        let removed = self
            .inner
            .collections
            .write()
            .get_mut(collection)
            .and_then(|records| records.remove(key))
            .is_some();
        if removed {
            self.announce(collection, key, ChangeKind::Removed);
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
