//! User-facing messages emitted by the catalog service.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use storefront_notifications::{NotificationSink, TemplateRenderer};
use tracing::warn;

pub const SOURCE: &str = "CatalogService";

pub const OPERATION_FAILED: &str = "operation_failed";
pub const NOT_FOUND: &str = "not_found";
pub const RATED: &str = "rated";
pub const ADDED: &str = "added";
pub const ADD_FAILED: &str = "add_failed";
pub const UPDATED: &str = "updated";
pub const DELETED: &str = "deleted";
pub const DELETE_FAILED: &str = "delete_failed";
pub const ASSETS_NOT_DELETED: &str = "assets_not_deleted";
pub const SEARCHED: &str = "searched";

fn catalog_templates() -> TemplateRenderer {
    TemplateRenderer::new()
        .with(OPERATION_FAILED, "{{operation}} failed: {{reason}}")
        .with(NOT_FOUND, "Found no Product with id={{id}}")
        .with(RATED, "Rated Product {{name}} with: {{rating}}")
        .with(ADDED, "Added Product {{name}}")
        .with(ADD_FAILED, "Add Failed, Product {{name}}")
        .with(UPDATED, "Updated Product {{name}}")
        .with(DELETED, "success deleting {{name}}")
        .with(DELETE_FAILED, "Delete failed {{name}}")
        .with(ASSETS_NOT_DELETED, "Could not delete images of {{name}}: {{reason}}")
        .with(SEARCHED, "found Products matching \"{{term}}\"")
}

/// Renders catalog message templates and hands them to the sink, prefixed
/// with the service name.
#[derive(Clone)]
pub struct Messages {
    sink: Arc<dyn NotificationSink>,
    templates: Arc<TemplateRenderer>,
}

impl Messages {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            templates: Arc::new(catalog_templates()),
        }
    }

    pub fn info(&self, template: &str, vars: &[(&str, Value)]) {
        let text = self.render(template, vars);
        self.sink.add(&text);
    }

    pub fn error(&self, template: &str, vars: &[(&str, Value)]) {
        let text = self.render(template, vars);
        self.sink.add_error(&text);
    }

    /// Reports `operation failed: reason`.
    pub fn failed(&self, operation: &str, reason: impl ToString) {
        self.error(
            OPERATION_FAILED,
            &[
                ("operation", Value::from(operation)),
                ("reason", Value::from(reason.to_string())),
            ],
        );
    }

    fn render(&self, template: &str, vars: &[(&str, Value)]) -> String {
        let data: HashMap<String, Value> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        match self.templates.render(template, &data) {
            Ok(body) => format!("{SOURCE}: {body}"),
            Err(err) => {
                warn!(template, error = %err, "Message template failed to render");
                format!("{SOURCE}: {template}")
            }
        }
    }
}

impl std::fmt::Debug for Messages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messages").finish_non_exhaustive()
    }
}
