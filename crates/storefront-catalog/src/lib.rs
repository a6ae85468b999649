//! # storefront-catalog
//!
//! The product catalog access layer: [`CatalogService`] answers product reads
//! from a shared [`CatalogCache`](storefront_cache::CatalogCache) over the
//! remote document store, performs writes (with asset uploads) directly
//! against the store, and searches through the gateway's HTTP endpoint.
//!
//! Operations never fail outright. Problems are logged, reported to the
//! notification sink, and replaced by an empty list, a `None`, or a
//! [`WriteOutcome::Rejected`].
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use futures_util::StreamExt;
//! use storefront_catalog::{CatalogService, Collaborators, config::loader};
//!
//! let config = loader::load_config(None)?;
//! storefront_catalog::observability::init_tracing_from_config(&config.logging);
//! let service = CatalogService::new(config, Collaborators { store, assets, sink })?;
//!
//! let mut products = service.list_products();
//! if let Some(snapshot) = products.next().await {
//!     println!("{} products", snapshot.len());
//! }
//! ```

pub mod config;
pub mod error;
mod featured;
pub mod messages;
pub mod observability;
pub mod outcome;
pub mod search;
pub mod service;

pub use config::{CatalogConfig, ConfigError, Listing, ListingOrder};
pub use error::CatalogError;
pub use outcome::WriteOutcome;
pub use search::{SearchClient, SearchError};
pub use service::{CachedListStream, CatalogService, Collaborators, ProductListStream, ProductStream};
