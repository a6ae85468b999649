use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Missing template variable '{variable}' in template {template}")]
    MissingVariable { template: String, variable: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
