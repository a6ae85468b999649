//! The catalog service.
//!
//! Reads go through the [`CatalogCache`]; writes go straight to the store and
//! rely on the store's push updates to refresh cached streams. Every
//! operation resolves to a value: failures are logged, reported to the
//! notification sink and replaced by a fallback.

use std::sync::Arc;

use futures_util::future;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use storefront_cache::{CatalogCache, Collection, Lookup, Selector};
use storefront_core::{Product, ProductId, UserId};
use storefront_notifications::NotificationSink;
use storefront_storage::{
    AssetFile, Document, DynAssetStore, DynDocumentStore, FieldPatch, Query, UploadedAsset,
};
use tracing::{debug, error, info, warn};

use crate::config::{CatalogConfig, ConfigError, Listing};
use crate::error::CatalogError;
use crate::messages::{self, Messages};
use crate::outcome::WriteOutcome;
use crate::search::SearchClient;

/// Stream of product lists that is not backed by the cache.
pub type ProductListStream = BoxStream<'static, Vec<Product>>;

/// Stream of product lists served from the cache.
pub type CachedListStream = BoxStream<'static, Collection<Product>>;

/// Stream of single-product lookups; `None` while the product is missing.
pub type ProductStream = BoxStream<'static, Option<Product>>;

/// External systems the service talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: DynDocumentStore,
    pub assets: DynAssetStore,
    pub sink: Arc<dyn NotificationSink>,
}

pub(crate) struct ServiceInner {
    pub(crate) config: CatalogConfig,
    pub(crate) store: DynDocumentStore,
    pub(crate) assets: DynAssetStore,
    pub(crate) messages: Messages,
    pub(crate) search: SearchClient,
    pub(crate) cache: CatalogCache<Product>,
}

/// Product catalog access layer.
///
/// Cheap to clone; clones share the cache and collaborators.
#[derive(Clone)]
pub struct CatalogService {
    pub(crate) inner: Arc<ServiceInner>,
}

impl CatalogService {
    pub fn new(config: CatalogConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let search = SearchClient::new(&config.search)
            .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        let cache = CatalogCache::with_capacity(config.cache.capacity);
        info!(
            backend = collaborators.store.backend_name(),
            products = %config.collections.products,
            search = %search.endpoint(),
            "Catalog service ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                messages: Messages::new(collaborators.sink),
                store: collaborators.store,
                assets: collaborators.assets,
                search,
                cache,
                config,
            }),
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &CatalogCache<Product> {
        &self.inner.cache
    }

    // ==================== Reads ====================

    /// All products in the configured default listing order.
    pub fn list_products(&self) -> CachedListStream {
        self.list_products_with(self.inner.config.listing)
    }

    /// All products, querying with `listing` if no cached stream is live.
    ///
    /// The cache always holds the whole collection; `listing.limit` only
    /// trims what this caller sees. A live cached stream is returned as is,
    /// whatever order built it.
    pub fn list_products_with(&self, listing: Listing) -> CachedListStream {
        let service = self.clone();
        let snapshots = self
            .inner
            .cache
            .get(&Selector::WholeCollection, move || service.open_collection(listing))
            .filter_map(|update| future::ready(update.into_snapshot()));

        match listing.limit {
            Some(limit) => snapshots.map(move |all| first_page(all, limit)).boxed(),
            None => snapshots.boxed(),
        }
    }

    /// Follows the product with `id`.
    ///
    /// Emits `None` (and reports the miss) whenever the current catalog has
    /// no such product.
    pub fn get_product(&self, id: impl Into<ProductId>) -> ProductStream {
        let service = self.clone();
        let listing = self.inner.config.listing;
        let lookups = self
            .inner
            .cache
            .get(&Selector::ByIdentity(id.into()), move || {
                service.open_collection(listing)
            })
            .filter_map(|update| future::ready(update.into_lookup()));

        let messages = self.inner.messages.clone();
        lookups
            .map(move |lookup| match lookup {
                Lookup::Found(product) => {
                    debug!(id = %product.id, "Fetched product");
                    Some(product)
                }
                Lookup::NotFound(id) => {
                    warn!(id = %id, "Product not found");
                    messages.error(messages::NOT_FOUND, &[("id", Value::from(id.to_string()))]);
                    None
                }
            })
            .boxed()
    }

    /// Products whose `field` equals `value`, at most `limit` of them.
    pub fn query_products(
        &self,
        field: &str,
        value: impl Into<Value>,
        limit: usize,
    ) -> ProductListStream {
        let query = Query::new()
            .order_by_child(field)
            .equal_to(value)
            .limit_to_first(limit);
        self.watch_products("getProductsQuery", &query, false)
    }

    /// The `n` most recent products, newest first.
    pub fn products_by_date(&self, n: usize) -> ProductListStream {
        self.watch_products("getProductsByDate", &Listing::newest(n).query(), true)
    }

    /// The `n` best rated products, best first.
    pub fn products_by_rating(&self, n: usize) -> ProductListStream {
        self.watch_products("getProductsByRating", &Listing::top_rated(n).query(), true)
    }

    /// Products matching `term` by name. Not cached.
    pub async fn search_products(&self, term: &str) -> Vec<Product> {
        if term.trim().is_empty() {
            debug!("Empty search term, skipping request");
            return Vec::new();
        }

        match self.inner.search.search(term).await {
            Ok(products) => {
                self.inner
                    .messages
                    .info(messages::SEARCHED, &[("term", Value::from(term))]);
                products
            }
            Err(err) => {
                warn!(term = %term, error = %err, "Product search failed");
                self.inner.messages.failed("searchProducts", &err);
                Vec::new()
            }
        }
    }

    /// Drops every cached stream; the next read queries the store again.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate();
        info!("Catalog cache cleared");
    }

    /// Upstream for the cached collection: `listing` without its limit, so
    /// every product can be projected.
    fn open_collection(&self, listing: Listing) -> ProductListStream {
        let unlimited = Listing {
            limit: None,
            ..listing
        };
        self.watch_products("getProducts", &unlimited.query(), listing.newest_first)
    }

    /// Live query over the products collection with the listing error policy
    /// applied: a store failure is reported, replaced by an empty list and
    /// ends the stream.
    fn watch_products(
        &self,
        operation: &'static str,
        query: &Query,
        newest_first: bool,
    ) -> ProductListStream {
        let collection = self.inner.config.collections.products.clone();
        let messages = self.inner.messages.clone();
        debug!(operation, collection = %collection, ?query, "Opening product query");

        self.inner
            .store
            .watch(&collection, query)
            .scan(false, move |failed, snapshot| {
                if *failed {
                    return future::ready(None);
                }
                let products = match snapshot {
                    Ok(documents) => {
                        let mut products = decode_products(&collection, documents);
                        if newest_first {
                            products.reverse();
                        }
                        products
                    }
                    Err(err) => {
                        error!(
                            operation,
                            category = %err.category(),
                            error = %err,
                            "Product query failed"
                        );
                        messages.failed(operation, &err);
                        *failed = true;
                        Vec::new()
                    }
                };
                future::ready(Some(products))
            })
            .boxed()
    }

    // ==================== Writes ====================

    /// Records `rating` by `user` and writes only that rating and the new
    /// average.
    pub async fn rate_product(&self, product: Product, rating: f64, user: &UserId) -> WriteOutcome {
        let score = match self.inner.config.ratings.scale().check(rating) {
            Ok(score) => score,
            Err(err) => {
                let error = CatalogError::from(err);
                return self.write_failed("rateProduct", product, error);
            }
        };

        let mut rated = product.clone();
        let current = rated.apply_rating(user, score);
        let patch = FieldPatch::new()
            .set_path(["ratings", user.as_str()], score)
            .set("currentRating", current);

        let key = rated.id.storage_key();
        if let Err(err) = self.inner.store.patch(self.products(), &key, &patch).await {
            let error = CatalogError::from_storage("rateProduct", &rated.id, &err);
            return self.write_failed("rateProduct", product, error);
        }

        info!(id = %rated.id, user = %user, rating = score, current_rating = current, "Product rated");
        self.inner.messages.info(
            messages::RATED,
            &[
                ("name", Value::from(rated.name.as_str())),
                ("rating", Value::from(score)),
            ],
        );
        self.after_write();
        WriteOutcome::applied(rated)
    }

    /// Uploads `files` in order, then creates the record with their URLs and
    /// refs appended.
    pub async fn add_product(&self, product: Product, files: &[AssetFile]) -> WriteOutcome {
        let uploaded = match self.upload_all(&product.id, files).await {
            Ok(uploaded) => uploaded,
            Err(error) => return self.add_failed(product, error),
        };

        let mut record = product.clone();
        for asset in &uploaded {
            record.push_image(&asset.download_url, &asset.storage_ref);
        }

        let document = match record.to_record() {
            Ok(document) => document,
            Err(err) => {
                self.discard_uploads(&uploaded).await;
                return self.add_failed(product, err.into());
            }
        };

        let key = record.id.storage_key();
        if let Err(err) = self.inner.store.set(self.products(), &key, &document).await {
            self.discard_uploads(&uploaded).await;
            return self.add_failed(product, CatalogError::remote("addProduct", &err));
        }

        info!(id = %record.id, images = uploaded.len(), "Product added");
        self.inner
            .messages
            .info(messages::ADDED, &[("name", Value::from(record.name.as_str()))]);
        self.after_write();
        WriteOutcome::applied(record)
    }

    /// Uploads `files`, then patches every field of the product.
    ///
    /// The first upload replaces the primary image and further uploads are
    /// appended. The replaced asset is deleted once the patch succeeded.
    pub async fn update_product(&self, product: Product, files: &[AssetFile]) -> WriteOutcome {
        let uploaded = match self.upload_all(&product.id, files).await {
            Ok(uploaded) => uploaded,
            Err(error) => return self.write_failed("updateProduct", product, error),
        };

        let mut record = product.clone();
        let mut replaced = None;
        for (position, asset) in uploaded.iter().enumerate() {
            if position == 0 {
                replaced = record.replace_primary_image(&asset.download_url, &asset.storage_ref);
            } else {
                record.push_image(&asset.download_url, &asset.storage_ref);
            }
        }

        let patch = match record
            .to_record()
            .map_err(CatalogError::from)
            .and_then(|document| {
                FieldPatch::from_record(&document)
                    .map_err(|err| CatalogError::remote("updateProduct", err))
            }) {
            Ok(patch) => patch,
            Err(error) => {
                self.discard_uploads(&uploaded).await;
                return self.write_failed("updateProduct", product, error);
            }
        };

        let key = record.id.storage_key();
        if let Err(err) = self.inner.store.patch(self.products(), &key, &patch).await {
            self.discard_uploads(&uploaded).await;
            let error = CatalogError::from_storage("updateProduct", &record.id, &err);
            return self.write_failed("updateProduct", product, error);
        }

        let mut warnings = Vec::new();
        if let Some(old_ref) = replaced
            && let Err(warning) = self.delete_assets(&record, vec![old_ref]).await
        {
            warnings.push(warning);
        }

        info!(id = %record.id, images = uploaded.len(), fields = patch.paths().len(), "Product updated");
        self.inner
            .messages
            .info(messages::UPDATED, &[("name", Value::from(record.name.as_str()))]);
        self.after_write();
        WriteOutcome::Applied {
            product: record,
            warnings,
        }
    }

    /// Deletes the product's assets, then the record. Asset failures are
    /// reported but do not stop the record delete.
    pub async fn delete_product(&self, product: Product) -> WriteOutcome {
        let mut warnings = Vec::new();
        if !product.image_refs.is_empty()
            && let Err(warning) = self.delete_assets(&product, product.image_refs.clone()).await
        {
            warnings.push(warning);
        }

        let key = product.id.storage_key();
        if let Err(err) = self.inner.store.remove(self.products(), &key).await {
            error!(id = %product.id, error = %err, "Deleting product failed");
            self.inner
                .messages
                .error(messages::DELETE_FAILED, &[("name", Value::from(product.name.as_str()))]);
            return WriteOutcome::rejected(product, CatalogError::remote("deleteProduct", &err));
        }

        info!(id = %product.id, asset_warnings = warnings.len(), "Product deleted");
        self.inner
            .messages
            .info(messages::DELETED, &[("name", Value::from(product.name.as_str()))]);
        self.after_write();
        WriteOutcome::Applied { product, warnings }
    }

    // ==================== Helpers ====================

    fn products(&self) -> &str {
        &self.inner.config.collections.products
    }

    fn after_write(&self) {
        if self.inner.config.cache.invalidate_on_write {
            self.inner.cache.invalidate();
        }
    }

    async fn upload_all(
        &self,
        owner: &ProductId,
        files: &[AssetFile],
    ) -> Result<Vec<UploadedAsset>, CatalogError> {
        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            match self.inner.assets.upload(owner, file).await {
                Ok(asset) => {
                    debug!(id = %owner, file = %file.name, storage_ref = %asset.storage_ref, "Uploaded asset");
                    uploaded.push(asset);
                }
                Err(err) => {
                    warn!(id = %owner, file = %file.name, error = %err, "Upload failed");
                    self.discard_uploads(&uploaded).await;
                    return Err(CatalogError::upload(&file.name, &err));
                }
            }
        }
        Ok(uploaded)
    }

    /// Best-effort removal of uploads that no record will reference.
    async fn discard_uploads(&self, uploaded: &[UploadedAsset]) {
        if uploaded.is_empty() {
            return;
        }
        let refs: Vec<String> = uploaded.iter().map(|a| a.storage_ref.clone()).collect();
        if let Err(err) = self.inner.assets.delete(&refs).await {
            warn!(count = refs.len(), error = %err, "Could not discard orphaned uploads");
        }
    }

    async fn delete_assets(&self, product: &Product, refs: Vec<String>) -> Result<(), CatalogError> {
        match self.inner.assets.delete(&refs).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(id = %product.id, count = refs.len(), error = %err, "Asset delete failed");
                self.inner.messages.error(
                    messages::ASSETS_NOT_DELETED,
                    &[
                        ("name", Value::from(product.name.as_str())),
                        ("reason", Value::from(err.to_string())),
                    ],
                );
                Err(CatalogError::partial_delete(refs, &err))
            }
        }
    }

    fn write_failed(&self, operation: &str, product: Product, error: CatalogError) -> WriteOutcome {
        error!(id = %product.id, operation, kind = error.kind(), error = %error, "Write rejected");
        let reason = match &error {
            CatalogError::RemoteFailure { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.inner.messages.failed(operation, reason);
        WriteOutcome::rejected(product, error)
    }

    fn add_failed(&self, product: Product, error: CatalogError) -> WriteOutcome {
        error!(id = %product.id, kind = error.kind(), error = %error, "Adding product failed");
        self.inner
            .messages
            .error(messages::ADD_FAILED, &[("name", Value::from(product.name.as_str()))]);
        WriteOutcome::rejected(product, error)
    }
}

impl std::fmt::Debug for CatalogService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogService")
            .field("backend", &self.inner.store.backend_name())
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

/// The first `limit` products of a cached snapshot.
fn first_page(all: Collection<Product>, limit: usize) -> Collection<Product> {
    if all.len() <= limit {
        all
    } else {
        Arc::new(all[..limit].to_vec())
    }
}

fn decode_products(collection: &str, documents: Vec<Document>) -> Vec<Product> {
    documents
        .into_iter()
        .filter_map(|document| {
            let key = document.key;
            match Product::from_document(document.value) {
                Ok(product) => Some(product),
                Err(err) => {
                    warn!(collection, key = %key, error = %err, "Skipping undecodable product");
                    None
                }
            }
        })
        .collect()
}
