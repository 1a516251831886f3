//! Visual Search Vector Engine
//!
//! Catalog snapshot cache, exact cosine ranking and the search pipeline
//! that ties them to an embedding provider

mod cache;
mod engine;
mod ranker;
mod similarity;
mod store;
mod types;

pub use cache::{CacheConfig, CacheState, CacheStats, CatalogCache};
pub use engine::{SearchEngine, SearchRequest, SearchResponse, SearchResultItem};
pub use ranker::SimilarityRanker;
pub use similarity::{cosine_similarity, COSINE_EPSILON};
pub use store::{
    catalog_store_from_source, CatalogStore, HttpCatalogStore, InMemoryCatalogStore,
    JsonFileCatalogStore,
};
pub use types::{parse_catalog, CatalogItem, CatalogSnapshot, ScoredItem};
