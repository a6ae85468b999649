use std::sync::Arc;

use tracing::{error, info};

/// Receives user-facing messages.
///
/// Both calls are fire-and-forget: a sink must not block the caller and has
/// no way to report failure back.
pub trait NotificationSink: Send + Sync {
    /// Records an informational message
    fn add(&self, text: &str);

    /// Records an error message
    fn add_error(&self, text: &str);
}

impl<S: NotificationSink + ?Sized> NotificationSink for Arc<S> {
    fn add(&self, text: &str) {
        (**self).add(text);
    }

    fn add_error(&self, text: &str) {
        (**self).add_error(text);
    }
}

/// Sink that only writes messages to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn add(&self, text: &str) {
        info!(target: "storefront::messages", message = %text, "User message");
    }

    fn add_error(&self, text: &str) {
        error!(target: "storefront::messages", message = %text, "User error message");
    }
}

/// Sink that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn add(&self, _text: &str) {}

    fn add_error(&self, _text: &str) {}
}
