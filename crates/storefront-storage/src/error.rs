//! Error types for the remote document store and the asset upload service.

use std::fmt;

/// Errors returned by [`DocumentStore`](crate::DocumentStore) and
/// [`AssetStore`](crate::AssetStore) implementations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {collection}/{key}")]
    NotFound {
        /// The collection that was searched.
        collection: String,
        /// The key that was not found.
        key: String,
    },

    /// The record data could not be stored or decoded.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of why the record is invalid.
        message: String,
    },

    /// The query shape is not supported by the backend.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Description of the query problem.
        message: String,
    },

    /// An asset upload or asset deletion failed.
    #[error("Asset error: {message}")]
    AssetError {
        /// Description of the asset failure.
        message: String,
    },

    /// The backend could not be reached.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// The backend rejected the caller's credential.
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Description supplied by the backend.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidQuery` error.
    #[must_use]
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates a new `AssetError` error.
    #[must_use]
    pub fn asset(message: impl Into<String>) -> Self {
        Self::AssetError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `PermissionDenied` error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidRecord { .. } | Self::InvalidQuery { .. } => ErrorCategory::Validation,
            Self::AssetError { .. } => ErrorCategory::Asset,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::PermissionDenied { .. } => ErrorCategory::Permission,
        }
    }
}

impl From<storefront_core::CoreError> for StorageError {
    fn from(err: storefront_core::CoreError) -> Self {
        Self::invalid_record(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record not found.
    NotFound,
    /// Malformed record or query.
    Validation,
    /// Upload service failure.
    Asset,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Credential rejected.
    Permission,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Asset => write!(f, "asset"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Permission => write!(f, "permission"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("products", "12");
        assert_eq!(err.to_string(), "Record not found: products/12");

        let err = StorageError::connection_error("socket closed");
        assert_eq!(err.to_string(), "Connection error: socket closed");
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("products", "1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::invalid_query("limit 0").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            StorageError::asset("bucket gone").category(),
            ErrorCategory::Asset
        );
        assert_eq!(
            StorageError::permission_denied("read-only credential").category(),
            ErrorCategory::Permission
        );
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }

    #[test]
    fn test_core_error_conversion() {
        let core = storefront_core::CoreError::invalid_id("");
        let err: StorageError = core.into();
        assert!(matches!(err, StorageError::InvalidRecord { .. }));
    }
}
