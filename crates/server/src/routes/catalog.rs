use actix_web::{get, post, web, HttpResponse};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/catalog/stats - Catalog cache statistics
#[get("/catalog/stats")]
pub async fn catalog_stats(
    state: web::Data<std::sync::Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let stats = state.engine.cache().stats().await;
    Ok(HttpResponse::Ok().json(stats))
}

/// POST /api/catalog/refresh - Refetch the catalog now
#[post("/catalog/refresh")]
pub async fn catalog_refresh(
    state: web::Data<std::sync::Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    info!("Catalog refresh requested");

    let cache = state.engine.cache();
    cache.refresh().await?;
    Ok(HttpResponse::Ok().json(cache.stats().await))
}

/// POST /api/catalog/invalidate - Mark the catalog stale without refetching
#[post("/catalog/invalidate")]
pub async fn catalog_invalidate(
    state: web::Data<std::sync::Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let cache = state.engine.cache();
    cache.invalidate();
    Ok(HttpResponse::Ok().json(cache.stats().await))
}
