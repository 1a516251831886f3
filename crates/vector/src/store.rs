use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};
use visearch_common::{Result, VisearchError};

use crate::types::{parse_catalog, CatalogItem};

/// Read-only source of catalog items
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Full ordered catalog, one read per call
    async fn fetch_all(&self) -> Result<Vec<CatalogItem>>;

    /// Items whose id is in `ids`, in catalog order
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<CatalogItem>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .fetch_all()
            .await?
            .into_iter()
            .filter(|item| wanted.contains(item.id.as_str()))
            .collect())
    }

    /// Human-readable source, for logs and stats
    fn describe(&self) -> String;
}

/// Pick a store for a configured source: http(s) URL or JSON file path
pub fn catalog_store_from_source(source: &str, timeout: Duration) -> Result<Arc<dyn CatalogStore>> {
    let source = source.trim();
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(Arc::new(HttpCatalogStore::new(source, timeout)?))
    } else {
        Ok(Arc::new(JsonFileCatalogStore::new(source)))
    }
}

/// Catalog exported as a JSON array of item documents
#[derive(Debug, Clone)]
pub struct JsonFileCatalogStore {
    path: PathBuf,
}

impl JsonFileCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogStore for JsonFileCatalogStore {
    async fn fetch_all(&self) -> Result<Vec<CatalogItem>> {
        let data = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            VisearchError::catalog_unavailable(format!(
                "Failed to read catalog file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let items = parse_catalog(serde_json::from_str(&data)?)?;

        debug!("Read {} items from {}", items.len(), self.path.display());
        Ok(items)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Catalog served by an HTTP endpoint returning a JSON array of items
#[derive(Debug, Clone)]
pub struct HttpCatalogStore {
    url: String,
    client: Client,
}

impl HttpCatalogStore {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        info!("HTTP catalog store initialized: {}", url);
        Ok(Self { url, client })
    }
}

#[async_trait]
impl CatalogStore for HttpCatalogStore {
    async fn fetch_all(&self) -> Result<Vec<CatalogItem>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| VisearchError::network(format!("Failed to reach catalog store: {}", e)))?
            .error_for_status()
            .map_err(|e| VisearchError::network(format!("Catalog store error: {}", e)))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VisearchError::network(format!("Failed to parse catalog response: {}", e)))?;

        parse_catalog(body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Catalog held in process memory; contents can be swapped at runtime
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    items: RwLock<Vec<CatalogItem>>,
}

impl InMemoryCatalogStore {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Replace the stored catalog
    pub fn replace(&self, items: Vec<CatalogItem>) {
        match self.items.write() {
            Ok(mut guard) => *guard = items,
            Err(poisoned) => *poisoned.into_inner() = items,
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn fetch_all(&self) -> Result<Vec<CatalogItem>> {
        self.items
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| VisearchError::internal("in-memory catalog lock poisoned"))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("a", "A", "https://cdn.example.com/a.jpg", Some(vec![1.0, 0.0])),
            CatalogItem::new("b", "B", "https://cdn.example.com/b.jpg", Some(vec![0.0, 1.0])),
            CatalogItem::new("c", "C", "https://cdn.example.com/c.jpg", None),
        ]
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "a", "name": "A", "category": "shoes", "image_url": "u1", "embedding": [1, 0]}},
                {{"id": "b", "name": "B", "image_url": "u2", "embedding": "broken"}}
            ]"#
        )
        .unwrap();

        let store = JsonFileCatalogStore::new(file.path());
        let items = store.fetch_all().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].embedding, Some(vec![1.0, 0.0]));
        assert_eq!(items[1].embedding, None);
        assert!(store.describe().starts_with("file:"));
    }

    #[tokio::test]
    async fn test_missing_file_is_unavailable() {
        let store = JsonFileCatalogStore::new("/nonexistent/catalog.json");
        let err = store.fetch_all().await.unwrap_err();
        assert!(matches!(err, VisearchError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_by_ids_keeps_catalog_order() {
        let store = InMemoryCatalogStore::new(sample());
        let items = store
            .fetch_by_ids(&["c".to_string(), "a".to_string(), "zzz".to_string()])
            .await
            .unwrap();

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_in_memory_replace() {
        let store = InMemoryCatalogStore::new(sample());
        assert_eq!(store.fetch_all().await.unwrap().len(), 3);

        store.replace(Vec::new());
        assert!(store.fetch_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_store_from_source() {
        let timeout = Duration::from_secs(5);
        let http = catalog_store_from_source("https://catalog.example.com/items", timeout).unwrap();
        assert_eq!(http.describe(), "https://catalog.example.com/items");

        let file = catalog_store_from_source(" ./data/catalog.json ", timeout).unwrap();
        assert_eq!(file.describe(), "file:./data/catalog.json");
    }
}
