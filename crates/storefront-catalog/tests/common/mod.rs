//! Test doubles and fixtures shared by the catalog integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use serde_json::Value;
use storefront_catalog::{CatalogConfig, CatalogService, Collaborators};
use storefront_core::{Product, ProductId};
use storefront_db_memory::{MemoryAssetStore, MemoryDocumentStore};
use storefront_notifications::MessageLog;
use storefront_storage::{
    AssetFile, AssetStore, Document, DocumentStore, DocumentStream, FieldPatch, Query,
    StorageError, UploadedAsset,
};

/// Ordered record of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Document store that delegates to memory and can be told to fail.
pub struct FlakyStore {
    pub memory: MemoryDocumentStore,
    pub journal: Journal,
    pub watch_calls: AtomicUsize,
    pub fail_watch: AtomicBool,
    pub fail_writes: AtomicBool,
    pub patches: Mutex<Vec<(String, FieldPatch)>>,
}

impl FlakyStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            memory: MemoryDocumentStore::new(),
            journal,
            watch_calls: AtomicUsize::new(0),
            fail_watch: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            patches: Mutex::new(Vec::new()),
        }
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn last_patch(&self) -> Option<(String, FieldPatch)> {
        self.patches.lock().last().cloned()
    }

    fn check_writes(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::permission_denied("read-only credential"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    fn watch(&self, collection: &str, query: &Query) -> DocumentStream {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_watch.load(Ordering::SeqCst) {
            return stream::once(async { Err(StorageError::connection_error("store offline")) })
                .boxed();
        }
        self.memory.watch(collection, query)
    }

    async fn fetch(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError> {
        self.memory.fetch(collection, query).await
    }

    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        self.memory.get(collection, key).await
    }

    async fn set(&self, collection: &str, key: &str, record: &Value) -> Result<(), StorageError> {
        self.journal.record(format!("set {collection}/{key}"));
        self.check_writes()?;
        self.memory.set(collection, key, record).await
    }

    async fn patch(
        &self,
        collection: &str,
        key: &str,
        patch: &FieldPatch,
    ) -> Result<(), StorageError> {
        self.journal.record(format!("patch {collection}/{key}"));
        self.check_writes()?;
        self.patches.lock().push((key.to_string(), patch.clone()));
        self.memory.patch(collection, key, patch).await
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        self.journal.record(format!("remove {collection}/{key}"));
        self.check_writes()?;
        self.memory.remove(collection, key).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky-memory"
    }
}

/// Asset store that delegates to memory and can be told to fail.
pub struct FlakyAssets {
    pub memory: MemoryAssetStore,
    pub journal: Journal,
    /// File name whose upload fails.
    pub fail_upload_of: Mutex<Option<String>>,
    pub fail_delete: AtomicBool,
}

impl FlakyAssets {
    pub fn new(journal: Journal) -> Self {
        Self {
            memory: MemoryAssetStore::with_base_url("https://cdn.test"),
            journal,
            fail_upload_of: Mutex::new(None),
            fail_delete: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl AssetStore for FlakyAssets {
    async fn upload(
        &self,
        owner: &ProductId,
        file: &AssetFile,
    ) -> Result<UploadedAsset, StorageError> {
        self.journal.record(format!("upload {}", file.name));
        if self.fail_upload_of.lock().as_deref() == Some(file.name.as_str()) {
            return Err(StorageError::asset("quota exceeded"));
        }
        self.memory.upload(owner, file).await
    }

    async fn delete(&self, refs: &[String]) -> Result<(), StorageError> {
        self.journal.record(format!("delete {}", refs.len()));
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StorageError::asset("permission denied"));
        }
        self.memory.delete(refs).await
    }
}

pub struct Harness {
    pub service: CatalogService,
    pub store: Arc<FlakyStore>,
    pub assets: Arc<FlakyAssets>,
    pub log: Arc<MessageLog>,
    pub journal: Journal,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::default())
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        let journal = Journal::default();
        let store = Arc::new(FlakyStore::new(journal.clone()));
        let assets = Arc::new(FlakyAssets::new(journal.clone()));
        let log = Arc::new(MessageLog::new());
        let service = CatalogService::new(
            config,
            Collaborators {
                store: store.clone(),
                assets: assets.clone(),
                sink: log.clone(),
            },
        )
        .expect("valid config");
        Self {
            service,
            store,
            assets,
            log,
            journal,
        }
    }

    /// Seeds products without announcing them.
    pub fn seed(&self, products: &[Product]) {
        self.store.memory.seed(
            "products",
            products
                .iter()
                .map(|p| (p.id.storage_key(), p.to_document().expect("encodable"))),
        );
    }

    pub async fn stored(&self, id: impl Into<ProductId>) -> Option<Product> {
        let key = id.into().storage_key();
        self.store
            .memory
            .get("products", &key)
            .await
            .expect("memory get")
            .map(|doc| Product::from_document(doc).expect("decodable"))
    }

    pub fn message_texts(&self) -> Vec<String> {
        self.log.messages().into_iter().map(|m| m.text).collect()
    }

    pub fn error_texts(&self) -> Vec<String> {
        self.log.errors().into_iter().map(|m| m.text).collect()
    }
}

pub fn product(id: i64, name: &str, date: i64) -> Product {
    Product::new(id, name, 10.0).with_date(date)
}

pub fn png(name: &str) -> AssetFile {
    AssetFile::new(name, "image/png", vec![1, 2, 3])
}

/// Next item of `stream`, failing the test after a second.
pub async fn next<S>(stream: &mut S) -> S::Item
where
    S: Stream + Unpin,
{
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream should emit in time")
        .expect("stream should not end")
}

/// Asserts that `stream` ends within a second.
pub async fn ends<S>(stream: &mut S)
where
    S: Stream + Unpin,
    S::Item: std::fmt::Debug,
{
    let item = tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("stream should end in time");
    assert!(item.is_none(), "expected end of stream, got {item:?}");
}

pub fn names(products: &[Product]) -> Vec<&str> {
    products.iter().map(|p| p.name.as_str()).collect()
}
