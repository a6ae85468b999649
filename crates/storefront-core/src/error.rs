use thiserror::Error;

/// Core error types for catalog model operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid product id: {0}")]
    InvalidId(String),

    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    #[error("Rating {value} is outside the allowed range {min}..={max}")]
    RatingOutOfRange { value: f64, min: f64, max: f64 },

    #[error("Product {id} has {urls} image URLs but {refs} image refs")]
    ImagePairMismatch { id: String, urls: usize, refs: usize },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new InvalidUserId error
    pub fn invalid_user_id(id: impl Into<String>) -> Self {
        Self::InvalidUserId(id.into())
    }

    /// Create a new RatingOutOfRange error
    pub fn rating_out_of_range(value: f64, min: f64, max: f64) -> Self {
        Self::RatingOutOfRange { value, min, max }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidId(_) | Self::InvalidUserId(_) | Self::RatingOutOfRange { .. } => {
                ErrorCategory::Validation
            }
            Self::ImagePairMismatch { .. } => ErrorCategory::Integrity,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Integrity,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Integrity => write!(f, "integrity"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
