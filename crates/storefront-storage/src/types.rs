//! Types shared by the store traits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;

/// A record read from a collection together with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Key of the record inside its collection.
    pub key: String,
    /// The record content.
    pub value: Value,
}

impl Document {
    /// Creates a new `Document`.
    #[must_use]
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// How query results are ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    /// Order by record key.
    #[default]
    Key,
    /// Order by the value of a top-level child field.
    Child(String),
}

/// Which end of the ordered result set a limit keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limit {
    /// Keep the first `n` records.
    First(usize),
    /// Keep the last `n` records.
    Last(usize),
}

/// A query over one collection.
///
/// Results are always delivered in ascending order of the ordering value;
/// callers that want newest-first reverse them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Ordering applied before range filters and limits.
    pub order_by: OrderBy,
    /// Only records whose ordering value equals this.
    pub equal_to: Option<Value>,
    /// Only records whose ordering value is `>=` this.
    pub start_at: Option<Value>,
    /// Only records whose ordering value is `<=` this.
    pub end_at: Option<Value>,
    /// Limit applied last.
    pub limit: Option<Limit>,
}

impl Query {
    /// Creates a query returning the whole collection ordered by key.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders by a child field.
    #[must_use]
    pub fn order_by_child(mut self, field: impl Into<String>) -> Self {
        self.order_by = OrderBy::Child(field.into());
        self
    }

    /// Keeps only records whose ordering value equals `value`.
    #[must_use]
    pub fn equal_to(mut self, value: impl Into<Value>) -> Self {
        self.equal_to = Some(value.into());
        self
    }

    /// Keeps only records whose ordering value is at least `value`.
    #[must_use]
    pub fn start_at(mut self, value: impl Into<Value>) -> Self {
        self.start_at = Some(value.into());
        self
    }

    /// Keeps only records whose ordering value is at most `value`.
    #[must_use]
    pub fn end_at(mut self, value: impl Into<Value>) -> Self {
        self.end_at = Some(value.into());
        self
    }

    /// Keeps the first `n` records.
    #[must_use]
    pub fn limit_to_first(mut self, n: usize) -> Self {
        self.limit = Some(Limit::First(n));
        self
    }

    /// Keeps the last `n` records.
    #[must_use]
    pub fn limit_to_last(mut self, n: usize) -> Self {
        self.limit = Some(Limit::Last(n));
        self
    }

    /// Rejects query shapes no backend can answer.
    pub fn validate(&self) -> Result<(), StorageError> {
        if let Some(Limit::First(0) | Limit::Last(0)) = self.limit {
            return Err(StorageError::invalid_query("limit must be greater than zero"));
        }
        if self.equal_to.is_some() && (self.start_at.is_some() || self.end_at.is_some()) {
            return Err(StorageError::invalid_query(
                "equal_to cannot be combined with start_at or end_at",
            ));
        }
        Ok(())
    }
}

/// A partial update naming the fields it changes.
///
/// Each entry replaces the value at its path; everything else in the record
/// is left untouched. Intermediate objects are created when missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    entries: Vec<(Vec<String>, Value)>,
}

impl FieldPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a top-level field.
    #[must_use]
    pub fn set(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_path([field.into()], value)
    }

    /// Sets a nested field, one segment per object level.
    #[must_use]
    pub fn set_path<I, S>(mut self, segments: I, value: impl Into<Value>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path: Vec<String> = segments.into_iter().map(Into::into).collect();
        self.entries.retain(|(existing, _)| existing != &path);
        self.entries.push((path, value.into()));
        self
    }

    /// Builds a patch that sets every top-level field of `record`.
    pub fn from_record(record: &Value) -> Result<Self, StorageError> {
        let fields = record
            .as_object()
            .ok_or_else(|| StorageError::invalid_record("record must be a JSON object"))?;
        Ok(fields
            .iter()
            .fold(Self::new(), |patch, (k, v)| patch.set(k.clone(), v.clone())))
    }

    /// Paths touched by this patch, `/`-joined, in insertion order.
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|(p, _)| p.join("/")).collect()
    }

    /// Value written at a `/`-joined path, if the patch touches it.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(p, _)| p.join("/") == path)
            .map(|(_, v)| v)
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the patch to `record` in place.
    ///
    /// Uses two RFC 7396 merge passes per entry: the first clears the target
    /// path, the second writes the new value, so object values replace rather
    /// than merge into what was there.
    pub fn apply_to(&self, record: &mut Value) -> Result<(), StorageError> {
        if !record.is_object() {
            return Err(StorageError::invalid_record("record must be a JSON object"));
        }
        for (path, value) in &self.entries {
            if path.is_empty() {
                return Err(StorageError::invalid_record("patch path must not be empty"));
            }
            json_patch::merge(record, &nest(path, Value::Null));
            json_patch::merge(record, &nest(path, value.clone()));
        }
        Ok(())
    }
}

fn nest(path: &[String], leaf: Value) -> Value {
    path.iter().rev().fold(leaf, |inner, segment| {
        let mut object = Map::new();
        object.insert(segment.clone(), inner);
        Value::Object(object)
    })
}

/// A binary asset handed to the upload service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Original file name.
    pub name: String,
    /// MIME type.
    pub content_type: String,
    /// File content.
    pub bytes: Vec<u8>,
}

impl AssetFile {
    /// Creates a new `AssetFile`.
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    /// Resolved public location of the asset.
    pub download_url: String,
    /// Opaque handle used to delete or replace the asset.
    pub storage_ref: String,
}
