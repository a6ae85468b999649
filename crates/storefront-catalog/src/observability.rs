// Tracing setup for the catalog crates with a level that can change at runtime.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

/// Crates whose events follow the configured level. Everything else,
/// the HTTP stack included, stays at `warn`.
const CATALOG_TARGETS: [&str; 6] = [
    "storefront_core",
    "storefront_storage",
    "storefront_db_memory",
    "storefront_notifications",
    "storefront_cache",
    "storefront_catalog",
];

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

fn catalog_filter(level: &str) -> EnvFilter {
    let directives = CATALOG_TARGETS
        .iter()
        .fold(String::from("warn"), |mut acc, target| {
            acc.push_str(&format!(",{target}={level}"));
            acc
        });
    EnvFilter::new(directives)
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_from_config(logging: &LoggingConfig) {
    init_tracing_with_level(&logging.level);
}

pub fn init_tracing_with_level(level: &str) {
    // RUST_LOG wins over the configured level.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| catalog_filter(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches the catalog crates to `level`.
///
/// Returns false when tracing was not initialized through this module.
pub fn apply_logging_level(level: &str) -> bool {
    match LOG_RELOAD_HANDLE.get() {
        Some(handle) => handle
            .modify(|filter| {
                *filter = catalog_filter(level);
            })
            .is_ok(),
        None => false,
    }
}
