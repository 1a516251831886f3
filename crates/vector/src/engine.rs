use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use visearch_common::{AppConfig, Result, VisearchError};
use visearch_embedding::{EmbeddingProvider, ImageInput};

use crate::cache::CatalogCache;
use crate::ranker::SimilarityRanker;

/// Image search request
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Query image
    pub image: ImageInput,

    /// Requested result count; engine default when `None`
    pub top_k: Option<usize>,

    /// Category pre-filter; blank means no filter
    pub category: Option<String>,
}

impl SearchRequest {
    pub fn new(image: ImageInput) -> Self {
        Self {
            image,
            top_k: None,
            category: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// One ranked match
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResultItem {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub image_url: String,

    /// Raw cosine similarity, unrounded
    pub score: f64,
}

/// Search outcome as returned to API clients
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub elapsed_ms: u64,

    /// Items considered after category filtering
    pub total_products_searched: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_image_type: Option<String>,

    pub category_filter: Option<String>,
}

/// Embedding provider + catalog cache + ranker
pub struct SearchEngine {
    cache: Arc<CatalogCache>,
    provider: Arc<dyn EmbeddingProvider>,
    ranker: SimilarityRanker,
    dimension: usize,
    default_top_k: usize,
    max_top_k: usize,
}

impl SearchEngine {
    /// Create new search engine expecting `dimension`-long query vectors
    pub fn new(
        cache: Arc<CatalogCache>,
        provider: Arc<dyn EmbeddingProvider>,
        dimension: usize,
    ) -> Self {
        info!(
            "Search engine initialized - model={}, dimension={}",
            provider.model(),
            dimension
        );

        Self {
            cache,
            provider,
            ranker: SimilarityRanker::new(),
            dimension,
            default_top_k: 5,
            max_top_k: 100,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        cache: Arc<CatalogCache>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self::new(cache, provider, config.embedding_dimension)
            .with_top_k_limits(config.default_top_k, config.max_top_k)
    }

    pub fn with_top_k_limits(mut self, default_top_k: usize, max_top_k: usize) -> Self {
        self.max_top_k = max_top_k.max(1);
        self.default_top_k = default_top_k.clamp(1, self.max_top_k);
        self
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        &self.cache
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Embed the query image, then rank the current catalog against it
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        let top_k = self.resolve_top_k(request.top_k)?;

        debug!(
            "Searching for: {} (top_k={}, category={:?})",
            request.image.describe(),
            top_k,
            request.category
        );

        let query = self.provider.embed_image(&request.image).await?;

        let mut response = self
            .search_by_vector(&query, Some(top_k), request.category.as_deref())
            .await?;

        match &request.image {
            ImageInput::Url(url) => response.query_image_url = Some(url.clone()),
            ImageInput::Bytes { mime_type, .. } => {
                response.query_image_type = Some(mime_type.clone())
            }
        }
        response.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            "Search completed - {} results from {} products in {}ms",
            response.results.len(),
            response.total_products_searched,
            response.elapsed_ms
        );
        Ok(response)
    }

    /// Rank the current catalog against an already computed query vector
    pub async fn search_by_vector(
        &self,
        query: &[f32],
        top_k: Option<usize>,
        category: Option<&str>,
    ) -> Result<SearchResponse> {
        let started = Instant::now();
        let top_k = self.resolve_top_k(top_k)?;
        self.validate_query(query)?;

        let snapshot = self.cache.get_snapshot().await?;
        let candidates = SimilarityRanker::filter_by_category(snapshot.items(), category);
        let total_products_searched = candidates.len();

        let results = self
            .ranker
            .rank(query, candidates, top_k)
            .into_iter()
            .map(|scored| SearchResultItem {
                id: scored.item.id.clone(),
                name: scored.item.name.clone(),
                category: scored.item.category.clone(),
                image_url: scored.item.image_url.clone(),
                score: scored.similarity,
            })
            .collect();

        Ok(SearchResponse {
            results,
            elapsed_ms: started.elapsed().as_millis() as u64,
            total_products_searched,
            query_image_url: None,
            query_image_type: None,
            category_filter: category.map(str::to_string),
        })
    }

    fn resolve_top_k(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_top_k),
            Some(0) => Err(VisearchError::invalid_input("top_k must be at least 1")),
            Some(k) if k > self.max_top_k => {
                debug!("Clamping top_k {} to {}", k, self.max_top_k);
                Ok(self.max_top_k)
            }
            Some(k) => Ok(k),
        }
    }

    fn validate_query(&self, query: &[f32]) -> Result<()> {
        if query.len() != self.dimension {
            return Err(VisearchError::dimension_mismatch(self.dimension, query.len()));
        }
        if query.iter().any(|x| !x.is_finite()) {
            return Err(VisearchError::invalid_input(
                "query vector contains non-finite values",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::store::{CatalogStore, InMemoryCatalogStore};
    use crate::types::CatalogItem;
    use async_trait::async_trait;

    /// Provider returning a fixed vector, or failing
    struct FixedProvider {
        embedding: Option<Vec<f32>>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed_image(&self, _input: &ImageInput) -> Result<Vec<f32>> {
            self.embedding
                .clone()
                .ok_or_else(|| VisearchError::embedding_provider("Embedding API error: 500"))
        }

        fn model(&self) -> &str {
            "fixed"
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct DownStore;

    #[async_trait]
    impl CatalogStore for DownStore {
        async fn fetch_all(&self) -> Result<Vec<CatalogItem>> {
            Err(VisearchError::network("connection refused"))
        }

        fn describe(&self) -> String {
            "down".to_string()
        }
    }

    fn catalog() -> Vec<CatalogItem> {
        vec![
            CatalogItem::new("a", "Alpha", "https://cdn.example.com/a.jpg", Some(vec![1.0, 0.0]))
                .with_category("shoes"),
            CatalogItem::new("b", "Beta", "https://cdn.example.com/b.jpg", Some(vec![0.0, 1.0]))
                .with_category("bags"),
            CatalogItem::new("c", "Gamma", "https://cdn.example.com/c.jpg", Some(vec![0.7, 0.7]))
                .with_category("shoes"),
            CatalogItem::new("d", "Delta", "https://cdn.example.com/d.jpg", None),
        ]
    }

    fn engine_with(store: Arc<dyn CatalogStore>, embedding: Option<Vec<f32>>) -> SearchEngine {
        let cache = Arc::new(CatalogCache::new(store, CacheConfig::default()));
        SearchEngine::new(cache, Arc::new(FixedProvider { embedding }), 2)
    }

    fn engine(embedding: Option<Vec<f32>>) -> SearchEngine {
        engine_with(Arc::new(InMemoryCatalogStore::new(catalog())), embedding)
    }

    fn url_request() -> SearchRequest {
        SearchRequest::new(ImageInput::Url("https://example.com/query.jpg".to_string()))
    }

    #[tokio::test]
    async fn test_search_by_url() {
        let response = engine(Some(vec![1.0, 0.0]))
            .search(url_request().with_top_k(2))
            .await
            .unwrap();

        let ids: Vec<_> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(response.total_products_searched, 4);
        assert_eq!(response.query_image_url.as_deref(), Some("https://example.com/query.jpg"));
        assert_eq!(response.query_image_type, None);
        assert_eq!(response.category_filter, None);
        assert_eq!(response.results[1].name, "Gamma");
    }

    #[tokio::test]
    async fn test_search_by_bytes_reports_type() {
        let request = SearchRequest::new(ImageInput::Bytes {
            data: vec![0xff, 0xd8],
            mime_type: "image/jpeg".to_string(),
        });
        let response = engine(Some(vec![0.0, 1.0])).search(request).await.unwrap();

        assert_eq!(response.query_image_type.as_deref(), Some("image/jpeg"));
        assert_eq!(response.results[0].id, "b");
        // default top_k 5, but only 3 eligible items
        assert_eq!(response.results.len(), 3);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("query_image_url").is_none());
        assert_eq!(json["query_image_type"], "image/jpeg");
    }

    #[tokio::test]
    async fn test_category_prefilter() {
        let response = engine(Some(vec![0.0, 1.0]))
            .search(url_request().with_category("Shoes"))
            .await
            .unwrap();

        let ids: Vec<_> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(response.total_products_searched, 2);
        assert_eq!(response.category_filter.as_deref(), Some("Shoes"));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let err = engine(None).search(url_request()).await.unwrap_err();
        assert!(matches!(err, VisearchError::EmbeddingProvider(_)));
    }

    #[tokio::test]
    async fn test_catalog_unavailable_propagates() {
        let err = engine_with(Arc::new(DownStore), Some(vec![1.0, 0.0]))
            .search(url_request())
            .await
            .unwrap_err();
        assert!(matches!(err, VisearchError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch() {
        let err = engine(Some(vec![1.0, 0.0, 0.0]))
            .search(url_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VisearchError::DimensionMismatch { expected: 2, actual: 3 }
        ));
    }

    #[tokio::test]
    async fn test_top_k_bounds() {
        let engine = engine(Some(vec![1.0, 0.0])).with_top_k_limits(1, 2);

        let err = engine.search(url_request().with_top_k(0)).await.unwrap_err();
        assert!(matches!(err, VisearchError::InvalidInput(_)));

        let response = engine.search(url_request().with_top_k(50)).await.unwrap();
        assert_eq!(response.results.len(), 2);

        let response = engine.search(url_request()).await.unwrap();
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn test_search_by_vector() {
        let engine = engine(None);
        let response = engine
            .search_by_vector(&[0.7, 0.7], Some(1), None)
            .await
            .unwrap();
        assert_eq!(response.results[0].id, "c");

        let err = engine
            .search_by_vector(&[f32::NAN, 1.0], Some(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, VisearchError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_not_an_error() {
        let response = engine_with(Arc::new(InMemoryCatalogStore::default()), Some(vec![1.0, 0.0]))
            .search(url_request())
            .await
            .unwrap();
        assert!(response.results.is_empty());
        assert_eq!(response.total_products_searched, 0);
    }
}
