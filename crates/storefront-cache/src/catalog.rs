//! The catalog cache.
//!
//! Holds at most one live subscription to the whole product collection and
//! answers single-product reads by projecting that collection. Entries are
//! memoized through weak handles: when the last subscriber of a stream goes
//! away the stream is torn down, and the next read builds a fresh one.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use storefront_core::{Product, ProductId};
use tracing::debug;

use crate::shared::{ReplayShared, Subscription, WeakShared};

/// Default per-stream broadcast buffer.
pub const DEFAULT_CAPACITY: usize = 16;

/// A record the cache can project by identity.
pub trait CacheRecord: Clone + Send + Sync + 'static {
    fn record_id(&self) -> &ProductId;
}

impl CacheRecord for Product {
    fn record_id(&self) -> &ProductId {
        &self.id
    }
}

/// One snapshot of the collection.
pub type Collection<T> = Arc<Vec<T>>;

/// Upstream handed to the cache by a factory.
pub type CollectionSource<T> = BoxStream<'static, Vec<T>>;

/// What a read asks the cache for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    WholeCollection,
    ByIdentity(ProductId),
}

/// Result of projecting a collection snapshot onto one identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound(ProductId),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(record) => Some(record),
            Self::NotFound(_) => None,
        }
    }
}

impl<T: CacheRecord> Lookup<T> {
    fn project(records: &[T], id: &ProductId) -> Self {
        records
            .iter()
            .find(|record| record.record_id() == id)
            .cloned()
            .map_or_else(|| Self::NotFound(id.clone()), Self::Found)
    }
}

/// Stream returned by [`CatalogCache::get`].
#[derive(Debug)]
pub enum CacheStream<T> {
    Collection(Subscription<Collection<T>>),
    Item(Subscription<Lookup<T>>),
}

/// One emission of a [`CacheStream`], tagged like the selector that asked
/// for it.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheUpdate<T> {
    Snapshot(Collection<T>),
    Lookup(Lookup<T>),
}

impl<T> CacheUpdate<T> {
    pub fn into_snapshot(self) -> Option<Collection<T>> {
        match self {
            Self::Snapshot(records) => Some(records),
            Self::Lookup(_) => None,
        }
    }

    pub fn into_lookup(self) -> Option<Lookup<T>> {
        match self {
            Self::Lookup(lookup) => Some(lookup),
            Self::Snapshot(_) => None,
        }
    }
}

impl<T: CacheRecord> Stream for CacheStream<T> {
    type Item = CacheUpdate<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<<Self as Stream>::Item>> {
        match self.get_mut() {
            Self::Collection(sub) => sub
                .poll_next_unpin(cx)
                .map(|next| next.map(CacheUpdate::Snapshot)),
            Self::Item(sub) => sub
                .poll_next_unpin(cx)
                .map(|next| next.map(CacheUpdate::Lookup)),
        }
    }
}

struct Entries<T> {
    collection: Option<WeakShared<Collection<T>>>,
    items: HashMap<ProductId, WeakShared<Lookup<T>>>,
}

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self {
            collection: None,
            items: HashMap::new(),
        }
    }
}

/// Shared, replaying cache over the product collection.
///
/// Must be used from within a Tokio runtime: creating an entry spawns the
/// task that drives its upstream.
pub struct CatalogCache<T = Product> {
    entries: Mutex<Entries<T>>,
    capacity: usize,
}

impl<T: CacheRecord> CatalogCache<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// `capacity` bounds how far a slow subscriber may fall behind before it
    /// skips to newer snapshots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    /// Returns the stream for `selector`, creating the collection entry with
    /// `factory` if none is live. The factory is dropped unused otherwise.
    pub fn get<F>(&self, selector: &Selector, factory: F) -> CacheStream<T>
    where
        F: FnOnce() -> CollectionSource<T>,
    {
        match selector {
            Selector::WholeCollection => CacheStream::Collection(self.collection(factory)),
            Selector::ByIdentity(id) => CacheStream::Item(self.item(id, factory)),
        }
    }

    /// Subscribes to the whole collection.
    fn collection<F>(&self, factory: F) -> Subscription<Collection<T>>
    where
        F: FnOnce() -> CollectionSource<T>,
    {
        let mut entries = self.entries.lock();
        self.collection_entry(&mut entries, factory).subscribe()
    }

    /// Subscribes to the projection of the collection onto `id`.
    ///
    /// Concurrent readers of the same id share one projection.
    fn item<F>(&self, id: &ProductId, factory: F) -> Subscription<Lookup<T>>
    where
        F: FnOnce() -> CollectionSource<T>,
    {
        let mut entries = self.entries.lock();
        if let Some(shared) = entries.items.get(id).and_then(WeakShared::upgrade) {
            debug!(id = %id, "Item projection cache hit");
            return shared.subscribe();
        }

        let snapshots = self.collection_entry(&mut entries, factory).subscribe();
        let wanted = id.clone();
        let projected = snapshots
            .map(move |records| Lookup::project(&records, &wanted))
            .boxed();
        let shared = ReplayShared::spawn(format!("products/{id}"), projected, self.capacity);

        entries.items.retain(|_, weak| weak.is_alive());
        entries.items.insert(id.clone(), shared.downgrade());
        debug!(id = %id, projections = entries.items.len(), "Item projection created");
        shared.subscribe()
    }

    fn collection_entry<F>(&self, entries: &mut Entries<T>, factory: F) -> ReplayShared<Collection<T>>
    where
        F: FnOnce() -> CollectionSource<T>,
    {
        if let Some(shared) = entries.collection.as_ref().and_then(WeakShared::upgrade) {
            debug!(handles = shared.handle_count(), "Collection cache hit");
            return shared;
        }

        let upstream = factory().map(Arc::new).boxed();
        let shared = ReplayShared::spawn("products", upstream, self.capacity);
        entries.collection = Some(shared.downgrade());
        debug!("Collection entry created");
        shared
    }

    /// Forgets the collection entry and every projection.
    ///
    /// Streams already handed out keep running until their subscribers drop
    /// them; the next read builds a new entry.
    pub fn invalidate(&self) {
        let mut entries = self.entries.lock();
        let had_entry = entries.collection.take().is_some();
        let projections = entries.items.len();
        entries.items.clear();
        debug!(had_entry, projections, "Catalog cache invalidated");
    }

    /// Returns true if a collection entry is live.
    pub fn is_cached(&self) -> bool {
        self.entries
            .lock()
            .collection
            .as_ref()
            .is_some_and(WeakShared::is_alive)
    }

    /// Live handles on the collection entry. Each item projection holds one.
    pub fn subscriber_count(&self) -> usize {
        self.entries
            .lock()
            .collection
            .as_ref()
            .map_or(0, WeakShared::handle_count)
    }

    /// Number of live item projections.
    pub fn projection_count(&self) -> usize {
        self.entries
            .lock()
            .items
            .values()
            .filter(|weak| weak.is_alive())
            .count()
    }
}

impl<T: CacheRecord> Default for CatalogCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CatalogCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("CatalogCache")
            .field("cached", &entries.collection.as_ref().is_some_and(WeakShared::is_alive))
            .field("projections", &entries.items.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
