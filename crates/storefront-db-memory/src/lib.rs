//! In-memory backends for the storefront catalog.
//!
//! This crate implements the `DocumentStore` and `AssetStore` traits from
//! `storefront-storage`. Writes are announced on a tokio broadcast channel so
//! live queries opened with `watch` re-emit their result set, the same way
//! the remote store pushes updates.
//!
//! # Example
//!
//! ```ignore
//! use storefront_db_memory::MemoryDocumentStore;
//! use storefront_storage::{DocumentStore, Query};
//!
//! let store = MemoryDocumentStore::new();
//! store.set("products", "1", &serde_json::json!({"id": 1, "name": "Lamp"})).await?;
//! let newest = store.fetch("products", &Query::new().order_by_child("date")).await?;
//! ```

pub mod assets;
pub mod broadcaster;
pub mod documents;
pub mod query;

pub use assets::MemoryAssetStore;
pub use broadcaster::{ChangeBroadcaster, ChangeEvent, ChangeKind};
pub use documents::MemoryDocumentStore;

pub use storefront_storage::{AssetStore, DocumentStore, StorageError};

/// Creates a shared in-memory document store.
pub fn create_document_store() -> storefront_storage::DynDocumentStore {
    std::sync::Arc::new(MemoryDocumentStore::new())
}

/// Creates a shared in-memory asset store.
pub fn create_asset_store() -> storefront_storage::DynAssetStore {
    std::sync::Arc::new(MemoryAssetStore::new())
}
