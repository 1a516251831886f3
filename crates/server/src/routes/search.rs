use actix_web::{post, web, HttpResponse};
use tracing::info;
use visearch_embedding::ImageInput;
use visearch_vector::SearchRequest;

use crate::error::{bad_request, ApiError};
use crate::state::AppState;
use crate::types::{normalize_category, UrlSearchRequest};

/// POST /api/search/url - Search the catalog with an image URL
#[post("/search/url")]
pub async fn search_by_url(
    body: web::Json<UrlSearchRequest>,
    state: web::Data<std::sync::Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();

    let image_url = body
        .image_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| bad_request("image_url is required"))?;

    let category = normalize_category(body.category);
    info!(
        "URL search - url: {}, top_k: {:?}, category: {:?}",
        image_url, body.top_k, category
    );

    let request = SearchRequest {
        image: ImageInput::Url(image_url),
        top_k: body.top_k,
        category,
    };
    let response = state.engine.search(request).await?;

    info!("URL search completed, found {} results", response.results.len());
    Ok(HttpResponse::Ok().json(response))
}
