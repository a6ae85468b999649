//! Collaborator traits for the remote document store and the asset upload
//! service.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::Value;
use storefront_core::ProductId;

use crate::error::StorageError;
use crate::types::{AssetFile, Document, FieldPatch, Query, UploadedAsset};

/// Live result stream of a watched query.
///
/// Emits the full result set once when the subscription is established and
/// again after every change to the watched collection. Dropping the stream
/// releases the subscription.
pub type DocumentStream = BoxStream<'static, Result<Vec<Document>, StorageError>>;

/// A remote, push-based document store.
///
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use storefront_storage::{DocumentStore, Query};
///
/// async fn newest(store: &dyn DocumentStore) -> Result<usize, StorageError> {
///     let query = Query::new().order_by_child("date").limit_to_last(6);
///     Ok(store.fetch("products", &query).await?.len())
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ==================== Queries ====================

    /// Opens a live subscription to `query` over `collection`.
    ///
    /// No work happens until the returned stream is polled.
    fn watch(&self, collection: &str, query: &Query) -> DocumentStream;

    /// Runs `query` once.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidQuery` for unsupported query shapes.
    async fn fetch(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StorageError>;

    /// Reads a record by key. Returns `None` if it does not exist.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError>;

    // ==================== Writes ====================

    /// Creates or fully replaces the record at `key`.
    async fn set(&self, collection: &str, key: &str, record: &Value) -> Result<(), StorageError>;

    /// Changes only the fields named by `patch`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn patch(
        &self,
        collection: &str,
        key: &str,
        patch: &FieldPatch,
    ) -> Result<(), StorageError>;

    /// Deletes the record at `key`. Deleting a missing record is not an error.
    async fn remove(&self, collection: &str, key: &str) -> Result<(), StorageError>;

    // ==================== Metadata ====================

    /// Returns the name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}

/// Binary asset upload service.
///
/// Neither operation retries; retry policy belongs to the implementation.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Uploads `file` on behalf of the product `owner`.
    async fn upload(
        &self,
        owner: &ProductId,
        file: &AssetFile,
    ) -> Result<UploadedAsset, StorageError>;

    /// Deletes the assets behind `refs`.
    ///
    /// Implementations attempt every ref and report the first failure.
    async fn delete(&self, refs: &[String]) -> Result<(), StorageError>;
}
