use serde::{Deserialize, Serialize};
use std::time::Duration;
use storefront_core::RatingScale;
use storefront_storage::Query;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub collections: CollectionsConfig,
    #[serde(default)]
    pub listing: Listing,
    #[serde(default)]
    pub ratings: RatingsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.collections.products.trim().is_empty() {
            return Err(ConfigError::invalid("collections.products must not be empty"));
        }
        if self.collections.featured.trim().is_empty() {
            return Err(ConfigError::invalid("collections.featured must not be empty"));
        }
        if self.listing.limit == Some(0) {
            return Err(ConfigError::invalid("listing.limit must be > 0"));
        }
        let scale = self.ratings.scale();
        if !(scale.min.is_finite() && scale.max.is_finite()) || scale.min > scale.max {
            return Err(ConfigError::invalid("ratings.min must be <= ratings.max"));
        }
        if url::Url::parse(&self.search.base_url).is_err() {
            return Err(ConfigError::invalid(format!(
                "search.base_url is not a valid URL: {}",
                self.search.base_url
            )));
        }
        if self.search.timeout_ms == Some(0) {
            return Err(ConfigError::invalid("search.timeout_ms must be > 0"));
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::invalid("cache.capacity must be > 0"));
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionsConfig {
    #[serde(default = "default_products_collection")]
    pub products: String,
    #[serde(default = "default_featured_collection")]
    pub featured: String,
}
fn default_products_collection() -> String {
    "products".into()
}
fn default_featured_collection() -> String {
    "featured".into()
}
impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            products: default_products_collection(),
            featured: default_featured_collection(),
        }
    }
}

/// Field a listing is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingOrder {
    #[default]
    Date,
    Rating,
}

impl ListingOrder {
    pub fn field(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Rating => "currentRating",
        }
    }
}

/// How a product listing is queried.
///
/// With `newest_first` the store's ascending order is reversed and `limit`
/// keeps the top of the reversed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    #[serde(default)]
    pub order_by: ListingOrder,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default = "default_newest_first")]
    pub newest_first: bool,
}
fn default_newest_first() -> bool {
    true
}
impl Default for Listing {
    fn default() -> Self {
        Self {
            order_by: ListingOrder::Date,
            limit: None,
            newest_first: default_newest_first(),
        }
    }
}

impl Listing {
    /// Newest `n` products by date.
    pub fn newest(n: usize) -> Self {
        Self {
            order_by: ListingOrder::Date,
            limit: Some(n),
            newest_first: true,
        }
    }

    /// Top `n` products by current rating.
    pub fn top_rated(n: usize) -> Self {
        Self {
            order_by: ListingOrder::Rating,
            limit: Some(n),
            newest_first: true,
        }
    }

    pub fn query(&self) -> Query {
        let query = Query::new().order_by_child(self.order_by.field());
        match (self.limit, self.newest_first) {
            (Some(n), true) => query.limit_to_last(n),
            (Some(n), false) => query.limit_to_first(n),
            (None, _) => query,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingsConfig {
    #[serde(default = "default_rating_min")]
    pub min: f64,
    #[serde(default = "default_rating_max")]
    pub max: f64,
}
fn default_rating_min() -> f64 {
    RatingScale::default().min
}
fn default_rating_max() -> f64 {
    RatingScale::default().max
}
impl Default for RatingsConfig {
    fn default() -> Self {
        Self {
            min: default_rating_min(),
            max: default_rating_max(),
        }
    }
}
impl RatingsConfig {
    pub fn scale(&self) -> RatingScale {
        RatingScale {
            min: self.min,
            max: self.max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Gateway base URL; products are searched at `<base_url>/products`
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Opaque credential sent as a bearer token
    #[serde(default)]
    pub bearer_token: Option<String>,
}
fn default_search_base_url() -> String {
    "http://localhost:3000/api".into()
}
impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            timeout_ms: None,
            bearer_token: None,
        }
    }
}
impl SearchConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Snapshots a slow subscriber may fall behind before skipping ahead
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Drop cached streams after every successful write
    #[serde(default)]
    pub invalidate_on_write: bool,
}
fn default_cache_capacity() -> usize {
    storefront_cache::DEFAULT_CAPACITY
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            invalidate_on_write: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{CatalogConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    const DEFAULT_PATH: &str = "storefront.toml";
    const ENV_PREFIX: &str = "STOREFRONT";

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .separator("__")
    }

    pub fn load_config(path: Option<&str>) -> Result<CatalogConfig, ConfigError> {
        load_with_environment(path, environment())
    }

    /// Loads from `path` (or `storefront.toml` when absent) with `env` layered
    /// on top, e.g. `STOREFRONT__CACHE__CAPACITY=32`.
    pub fn load_with_environment(
        path: Option<&str>,
        env: Environment,
    ) -> Result<CatalogConfig, ConfigError> {
        let mut builder = Config::builder();
        let file = path.map_or_else(|| PathBuf::from(DEFAULT_PATH), PathBuf::from);
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        builder = builder.add_source(env);
        let merged: CatalogConfig = builder.build()?.try_deserialize()?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<CatalogConfig, ConfigError> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }

    /// Environment source with `STOREFRONT` prefix reading from `vars`
    /// instead of the process environment.
    pub fn environment_from<I, K, V>(vars: I) -> Environment
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        environment().source(Some(
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}
