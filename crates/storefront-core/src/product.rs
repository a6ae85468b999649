//! Product record as stored in the `products` collection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::id::{ProductId, UserId};
use crate::rating::mean_rating;

/// A catalog product.
///
/// `image_urls[i]` and `image_refs[i]` describe the same asset; use
/// [`Product::push_image`] and [`Product::replace_primary_image`] to keep the
/// two sequences paired. Fields the model does not know about are kept in
/// `extra` so a read-modify-write never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub description: String,
    /// Ordering key, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
    #[serde(default, rename = "imageURLs")]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub image_refs: Vec<String>,
    #[serde(default)]
    pub ratings: BTreeMap<String, f64>,
    #[serde(default)]
    pub current_rating: f64,
    /// Only present on featured listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_featured_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            description: String::new(),
            date: None,
            image_urls: Vec::new(),
            image_refs: Vec::new(),
            ratings: BTreeMap::new(),
            current_rating: 0.0,
            image_featured_url: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_date(mut self, date: i64) -> Self {
        self.date = Some(date);
        self
    }

    /// Appends an uploaded asset, keeping URL and ref positions aligned.
    pub fn push_image(&mut self, url: impl Into<String>, storage_ref: impl Into<String>) {
        self.image_urls.push(url.into());
        self.image_refs.push(storage_ref.into());
    }

    /// Replaces the asset at position 0, or appends one if there is none.
    ///
    /// Returns the storage ref that was replaced.
    pub fn replace_primary_image(
        &mut self,
        url: impl Into<String>,
        storage_ref: impl Into<String>,
    ) -> Option<String> {
        if self.image_urls.is_empty() || self.image_refs.is_empty() {
            self.push_image(url, storage_ref);
            return None;
        }
        self.image_urls[0] = url.into();
        Some(std::mem::replace(&mut self.image_refs[0], storage_ref.into()))
    }

    /// Checks that every image URL has a matching storage ref.
    pub fn check_image_pairs(&self) -> Result<(), CoreError> {
        if self.image_urls.len() != self.image_refs.len() {
            return Err(CoreError::ImagePairMismatch {
                id: self.id.to_string(),
                urls: self.image_urls.len(),
                refs: self.image_refs.len(),
            });
        }
        Ok(())
    }

    /// Records `score` for `user` (replacing any earlier score by the same
    /// user) and recomputes `current_rating` from scratch.
    pub fn apply_rating(&mut self, user: &UserId, score: f64) -> f64 {
        self.ratings.insert(user.as_str().to_string(), score);
        self.current_rating = mean_rating(self.ratings.values().copied());
        self.current_rating
    }

    /// Serializes the record into the document shape used by the store.
    pub fn to_document(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }

    /// The document written to `products/<id>`. The featured image is left
    /// out; it belongs to the featured index.
    pub fn to_record(&self) -> Result<Value, CoreError> {
        let mut document = self.to_document()?;
        if let Value::Object(fields) = &mut document {
            fields.remove("imageFeaturedUrl");
        }
        Ok(document)
    }

    /// Parses a stored document.
    pub fn from_document(document: Value) -> Result<Self, CoreError> {
        Ok(serde_json::from_value(document)?)
    }
}
