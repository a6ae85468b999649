//! # storefront-storage
//!
//! Collaborator contracts for the catalog access layer.
//!
//! This crate defines the traits and types the catalog service talks to. It
//! does not contain any implementations; `storefront-db-memory` provides an
//! in-memory one.
//!
//! ## Overview
//!
//! - [`DocumentStore`]: the remote, push-based document store. Ordered,
//!   range and equality queries, live subscriptions via [`DocumentStore::watch`],
//!   full-record writes, [`FieldPatch`] partial updates and deletes.
//! - [`AssetStore`]: the binary upload service.
//!
//! ## Example
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use storefront_storage::{DocumentStore, Query};
//!
//! let mut live = store.watch("products", &Query::new().order_by_child("date"));
//! while let Some(snapshot) = live.next().await {
//!     println!("{} products", snapshot?.len());
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{AssetStore, DocumentStore, DocumentStream};
pub use types::{AssetFile, Document, FieldPatch, Limit, OrderBy, Query, UploadedAsset};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Shared document store handle.
pub type DynDocumentStore = std::sync::Arc<dyn DocumentStore>;

/// Shared asset store handle.
pub type DynAssetStore = std::sync::Arc<dyn AssetStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use storefront_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::traits::{AssetStore, DocumentStore, DocumentStream};
    pub use crate::types::{AssetFile, Document, FieldPatch, Limit, OrderBy, Query, UploadedAsset};
    pub use crate::{DynAssetStore, DynDocumentStore, StorageResult};
}
