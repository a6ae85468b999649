//! Identity types for products and users.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Product identity. Stored records use either numeric or string ids, and the
/// two forms never compare equal to each other (`1` is not `"1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    Number(i64),
    Text(String),
}

impl ProductId {
    /// The key under which the record lives in the products collection.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }

    /// Recovers an id from a collection key. Keys that parse as integers
    /// become numeric ids.
    pub fn from_storage_key(key: &str) -> Self {
        key.parse::<i64>()
            .map_or_else(|_| Self::Text(key.to_string()), Self::Number)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ProductId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ProductId {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ProductId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Opaque user identity taken from the caller's credential.
///
/// Used as a key inside `ratings`, so it must be non-empty and must not
/// contain the `/` path separator used by patch paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() || id.contains('/') {
            return Err(CoreError::invalid_user_id(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
