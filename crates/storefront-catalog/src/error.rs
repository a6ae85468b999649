//! Errors surfaced by catalog operations.
//!
//! None of these is ever raised out of the service: they travel inside
//! [`WriteOutcome`](crate::WriteOutcome) values and into user messages.

use storefront_core::{CoreError, ProductId};
use storefront_storage::StorageError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    /// No product with the requested identity exists.
    #[error("Found no Product with id={id}")]
    NotFound { id: ProductId },

    /// The remote store rejected or failed an operation.
    #[error("{operation} failed: {message}")]
    RemoteFailure { operation: String, message: String },

    /// A file could not be uploaded; nothing was written.
    #[error("Upload of {file} failed: {message}")]
    UploadFailure { file: String, message: String },

    /// Some assets could not be deleted. The record write still happened.
    #[error("Could not delete {} asset(s): {message}", refs.len())]
    PartialDeleteFailure { refs: Vec<String>, message: String },

    /// The score is outside the configured scale; nothing was written.
    #[error("Rating {value} is outside the allowed range {min}..={max}")]
    InvalidRating { value: f64, min: f64, max: f64 },
}

impl CatalogError {
    pub fn not_found(id: impl Into<ProductId>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn remote(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::RemoteFailure {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn upload(file: impl Into<String>, message: impl ToString) -> Self {
        Self::UploadFailure {
            file: file.into(),
            message: message.to_string(),
        }
    }

    pub fn partial_delete(refs: Vec<String>, message: impl ToString) -> Self {
        Self::PartialDeleteFailure {
            refs,
            message: message.to_string(),
        }
    }

    /// Maps a store error for `operation`, keeping not-found distinct.
    pub fn from_storage(operation: &str, id: &ProductId, err: &StorageError) -> Self {
        if err.is_not_found() {
            Self::not_found(id.clone())
        } else {
            Self::remote(operation, err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::RemoteFailure { .. } => "remote_failure",
            Self::UploadFailure { .. } => "upload_failure",
            Self::PartialDeleteFailure { .. } => "partial_delete_failure",
            Self::InvalidRating { .. } => "invalid_rating",
        }
    }
}

impl From<CoreError> for CatalogError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RatingOutOfRange { value, min, max } => {
                Self::InvalidRating { value, min, max }
            }
            other => Self::remote("encode", other),
        }
    }
}
