use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;
use visearch_common::{Result, VisearchError};

/// Catalog item as stored by the catalog store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique item key
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Category label
    #[serde(default)]
    pub category: Option<String>,

    /// Product image location
    #[serde(default)]
    pub image_url: String,

    /// Precomputed image embedding; `None` when missing or malformed
    #[serde(
        default,
        deserialize_with = "lenient_embedding",
        skip_serializing_if = "Option::is_none"
    )]
    pub embedding: Option<Vec<f32>>,
}

impl CatalogItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image_url: impl Into<String>,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            image_url: image_url.into(),
            embedding,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Accept only arrays made entirely of numbers; anything else means "no embedding"
fn lenient_embedding<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<f32>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(values)) if !values.is_empty() => values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect(),
        _ => None,
    })
}

/// Decode a catalog document list, skipping entries that are not items
pub fn parse_catalog(value: Value) -> Result<Vec<CatalogItem>> {
    let Value::Array(documents) = value else {
        return Err(VisearchError::invalid_input(
            "catalog payload must be a JSON array of items",
        ));
    };

    let mut items = Vec::with_capacity(documents.len());
    for (position, document) in documents.into_iter().enumerate() {
        match serde_json::from_value::<CatalogItem>(document) {
            Ok(item) => items.push(item),
            Err(e) => warn!("Skipping malformed catalog entry at position {}: {}", position, e),
        }
    }
    Ok(items)
}

/// Immutable point-in-time copy of the catalog
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    items: Vec<CatalogItem>,
    fetched_at: DateTime<Utc>,
    fetched_instant: Instant,
    dimension: Option<usize>,
    embedded_count: usize,
}

impl CatalogSnapshot {
    /// Build a snapshot stamped with the current time
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let dimension = items
            .iter()
            .find_map(|item| item.embedding.as_ref().map(Vec::len));
        let embedded_count = match dimension {
            Some(dim) => items
                .iter()
                .filter(|item| item.embedding.as_ref().is_some_and(|e| e.len() == dim))
                .count(),
            None => 0,
        };

        if embedded_count < items.len() {
            warn!(
                "Catalog snapshot: {} of {} items lack a usable {}-dim embedding",
                items.len() - embedded_count,
                items.len(),
                dimension.unwrap_or(0)
            );
        }

        Self {
            items,
            fetched_at: Utc::now(),
            fetched_instant: Instant::now(),
            dimension,
            embedded_count,
        }
    }

    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Wall-clock fetch time
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Embedding length of the first item carrying one
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Items whose embedding matches the snapshot dimension
    pub fn embedded_count(&self) -> usize {
        self.embedded_count
    }

    pub fn age(&self) -> Duration {
        self.fetched_instant.elapsed()
    }

    /// Stale once the age reaches the freshness window
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

/// Item with its similarity to the current query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem<'a> {
    pub item: &'a CatalogItem,
    pub similarity: f64,
}
