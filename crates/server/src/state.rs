use std::sync::Arc;
use tracing::{info, warn};
use visearch_common::{AppConfig, Result};
use visearch_embedding::JinaClient;
use visearch_vector::{catalog_store_from_source, CacheConfig, CatalogCache, SearchEngine};

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Search pipeline (provider, catalog cache, ranker)
    pub engine: Arc<SearchEngine>,
}

impl AppState {
    /// Create new application state from configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        let engine = build_engine(&config)?;
        Ok(Self::with_engine(config, Arc::new(engine)))
    }

    /// Create state around an existing engine
    pub fn with_engine(config: AppConfig, engine: Arc<SearchEngine>) -> Self {
        Self { config, engine }
    }

    /// Load the catalog once before serving; failure only delays it to the
    /// first search
    pub async fn warm_up(&self) {
        match self.engine.cache().get_snapshot().await {
            Ok(snapshot) => info!("Catalog preloaded: {} items", snapshot.len()),
            Err(e) => warn!("Catalog preload failed, will retry on first search: {}", e),
        }
    }
}

/// Wire store, cache and embedding client from configuration
pub fn build_engine(config: &AppConfig) -> Result<SearchEngine> {
    let store = catalog_store_from_source(&config.catalog_source, config.catalog_fetch_timeout())?;
    let cache = Arc::new(CatalogCache::new(store, CacheConfig::from_app_config(config)));
    let provider = Arc::new(JinaClient::from_config(config)?);

    Ok(SearchEngine::from_config(config, cache, provider))
}
