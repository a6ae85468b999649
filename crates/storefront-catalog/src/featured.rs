//! Featured products.
//!
//! The featured index maps product keys to a featured image. Every index
//! snapshot starts a new combination of live product lookups, replacing the
//! previous one; the combined list is emitted once every entry has resolved
//! and again whenever any of them changes.

use futures_util::stream::{BoxStream, SelectAll, StreamExt, select_all};
use serde_json::Value;
use storefront_core::{Product, ProductId};
use storefront_storage::{Document, Query};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::service::{CatalogService, ProductListStream};

const FEATURED_BUFFER: usize = 8;

#[derive(Debug, Clone, PartialEq)]
struct FeaturedEntry {
    id: ProductId,
    image_featured_url: Option<String>,
}

impl FeaturedEntry {
    /// Uses the entry's `id` field when present, the index key otherwise.
    fn from_document(document: &Document) -> Self {
        let id = document
            .value
            .get("id")
            .and_then(|id| serde_json::from_value::<ProductId>(id.clone()).ok())
            .unwrap_or_else(|| ProductId::from_storage_key(&document.key));
        let image_featured_url = document
            .value
            .get("imageFeaturedUrl")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self {
            id,
            image_featured_url,
        }
    }
}

/// Latest-value combination of one lookup stream per featured entry.
struct Combination {
    entries: Vec<FeaturedEntry>,
    latest: Vec<Option<Option<Product>>>,
    updates: SelectAll<BoxStream<'static, (usize, Option<Product>)>>,
}

impl Combination {
    fn new(service: &CatalogService, entries: Vec<FeaturedEntry>) -> Self {
        let updates = select_all(entries.iter().enumerate().map(|(position, entry)| {
            service
                .get_product(entry.id.clone())
                .map(move |product| (position, product))
                .boxed()
        }));
        Self {
            latest: vec![None; entries.len()],
            entries,
            updates,
        }
    }

    /// Waits for the next change that leaves every entry resolved.
    async fn next(&mut self) -> Option<Vec<Product>> {
        while let Some((position, product)) = self.updates.next().await {
            self.latest[position] = Some(product);
            if self.latest.iter().all(Option::is_some) {
                return Some(self.assemble());
            }
        }
        None
    }

    /// Resolved products in index order. Entries whose product is missing
    /// are left out.
    fn assemble(&self) -> Vec<Product> {
        self.entries
            .iter()
            .zip(&self.latest)
            .filter_map(|(entry, latest)| {
                let mut product = latest.clone().flatten()?;
                product.image_featured_url = entry.image_featured_url.clone();
                Some(product)
            })
            .collect()
    }
}

async fn next_combined(current: &mut Option<Combination>) -> Option<Vec<Product>> {
    match current {
        Some(combination) => combination.next().await,
        None => std::future::pending().await,
    }
}

impl CatalogService {
    /// Featured products with their featured image attached.
    ///
    /// Runs on a background task that stops when the returned stream is
    /// dropped.
    pub fn list_featured(&self) -> ProductListStream {
        let (tx, rx) = mpsc::channel(FEATURED_BUFFER);
        let service = self.clone();
        tokio::spawn(async move { service.run_featured(tx).await });
        ReceiverStream::new(rx).boxed()
    }

    async fn run_featured(self, tx: mpsc::Sender<Vec<Product>>) {
        let collection = self.inner.config.collections.featured.clone();
        let mut index = self.inner.store.watch(&collection, &Query::new());
        let mut current: Option<Combination> = None;

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!("Featured listing dropped");
                    break;
                }
                snapshot = index.next() => match snapshot {
                    Some(Ok(documents)) => {
                        let entries: Vec<FeaturedEntry> =
                            documents.iter().map(FeaturedEntry::from_document).collect();
                        debug!(entries = entries.len(), "Featured index changed");
                        if entries.is_empty() {
                            current = None;
                            if tx.send(Vec::new()).await.is_err() {
                                break;
                            }
                        } else {
                            current = Some(Combination::new(&self, entries));
                        }
                    }
                    Some(Err(err)) => {
                        error!(collection = %collection, error = %err, "Featured index query failed");
                        self.inner.messages.failed("getFeaturedProducts", &err);
                        let _ = tx.send(Vec::new()).await;
                        break;
                    }
                    None => break,
                },
                Some(products) = next_combined(&mut current) => {
                    if tx.send(products).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}
