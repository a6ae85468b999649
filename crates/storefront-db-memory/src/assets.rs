//! In-memory [`AssetStore`].

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use storefront_core::ProductId;
use storefront_storage::{AssetFile, AssetStore, StorageError, UploadedAsset};
use tracing::debug;
use uuid::Uuid;

const DEFAULT_BASE_URL: &str = "memory://assets";

#[derive(Debug, Clone)]
struct StoredAsset {
    content_type: String,
    bytes: Arc<[u8]>,
}

/// Asset store that keeps uploaded bytes in a concurrent map keyed by
/// storage ref.
#[derive(Debug, Clone)]
pub struct MemoryAssetStore {
    assets: Arc<DashMap<String, StoredAsset>>,
    base_url: Arc<str>,
}

impl MemoryAssetStore {
    /// Creates an empty store serving from `memory://assets`.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates an empty store whose download URLs start with `base_url`.
    pub fn with_base_url(base_url: impl AsRef<str>) -> Self {
        Self {
            assets: Arc::new(DashMap::new()),
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        }
    }

    /// Returns true if an asset is stored under `storage_ref`.
    pub fn contains(&self, storage_ref: &str) -> bool {
        self.assets.contains_key(storage_ref)
    }

    /// Content and MIME type of the asset under `storage_ref`.
    pub fn read(&self, storage_ref: &str) -> Option<(String, Vec<u8>)> {
        self.assets
            .get(storage_ref)
            .map(|asset| (asset.content_type.clone(), asset.bytes.to_vec()))
    }

    /// Number of stored assets.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for MemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn upload(
        &self,
        owner: &ProductId,
        file: &AssetFile,
    ) -> Result<UploadedAsset, StorageError> {
        if file.name.trim().is_empty() {
            return Err(StorageError::asset("file name must not be empty"));
        }
        let storage_ref = format!("products/{owner}/{}-{}", Uuid::new_v4(), file.name);
        self.assets.insert(
            storage_ref.clone(),
            StoredAsset {
                content_type: file.content_type.clone(),
                bytes: Arc::from(file.bytes.as_slice()),
            },
        );
        debug!(owner = %owner, storage_ref = %storage_ref, size = file.bytes.len(), "Stored asset");

        Ok(UploadedAsset {
            download_url: format!("{}/{storage_ref}", self.base_url),
            storage_ref,
        })
    }

    async fn delete(&self, refs: &[String]) -> Result<(), StorageError> {
        let mut missing = None;
        for storage_ref in refs {
            if self.assets.remove(storage_ref).is_none() && missing.is_none() {
                missing = Some(storage_ref.clone());
            }
        }
        match missing {
            Some(storage_ref) => Err(StorageError::asset(format!(
                "no asset stored under '{storage_ref}'"
            ))),
            None => Ok(()),
        }
    }
}
