//! # storefront-cache
//!
//! In-process cache in front of the push-based product store.
//!
//! - [`ReplayShared`] / [`Subscription`]: a stream that runs its upstream once
//!   and multicasts to many subscribers, replaying the latest value to late
//!   joiners and releasing the upstream when the last subscriber leaves.
//! - [`CatalogCache`]: memoizes one such stream for the whole collection and
//!   derives shared single-item projections from it.
//!
//! ## Example
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use storefront_cache::{CatalogCache, Selector};
//!
//! let cache = CatalogCache::new();
//! let mut products = cache.get(&Selector::WholeCollection, || store_query());
//! while let Some(update) = products.next().await {
//!     if let Some(snapshot) = update.into_snapshot() {
//!         println!("{} products", snapshot.len());
//!     }
//! }
//! ```

pub mod catalog;
pub mod shared;

pub use catalog::{
    CacheRecord, CacheStream, CacheUpdate, CatalogCache, Collection, CollectionSource,
    DEFAULT_CAPACITY, Lookup, Selector,
};
pub use shared::{ReplayShared, Subscription, WeakShared};
