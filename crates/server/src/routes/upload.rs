use actix_multipart::Multipart;
use actix_web::{post, web, HttpResponse};
use futures_util::StreamExt;
use tracing::info;
use visearch_common::VisearchError;
use visearch_embedding::ImageInput;
use visearch_vector::SearchRequest;

use crate::error::{bad_request, ApiError};
use crate::state::AppState;
use crate::types::{normalize_category, parse_top_k};

/// Uploaded query image
struct UploadedImage {
    filename: String,
    mime_type: String,
    data: Vec<u8>,
}

/// POST /api/search/upload - Search the catalog with an uploaded image
///
/// Multipart fields: `file` (required, image/*), `top_k`, `category`.
#[post("/search/upload")]
pub async fn search_by_upload(
    mut payload: Multipart,
    state: web::Data<std::sync::Arc<AppState>>,
) -> Result<HttpResponse, ApiError> {
    let max_bytes = state.config.max_upload_bytes;
    let mut image: Option<UploadedImage> = None;
    let mut top_k = None;
    let mut category = None;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?;
        let content_disposition = field.content_disposition();
        let name = content_disposition.get_name().unwrap_or_default().to_string();
        let filename = content_disposition
            .get_filename()
            .unwrap_or("unknown")
            .to_string();
        let mime_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default();

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;
            if data.len() + chunk.len() > max_bytes {
                return Err(ApiError(VisearchError::payload_too_large(format!(
                    "upload exceeds the {} byte limit",
                    max_bytes
                ))));
            }
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "file" => {
                image = Some(UploadedImage {
                    filename,
                    mime_type,
                    data,
                })
            }
            "top_k" => top_k = parse_top_k(&String::from_utf8_lossy(&data)),
            "category" => category = Some(String::from_utf8_lossy(&data).into_owned()),
            _ => {}
        }
    }

    let image = image.ok_or_else(|| bad_request("file required"))?;
    if !image.mime_type.starts_with("image/") {
        return Err(bad_request("File must be an image"));
    }

    let category = normalize_category(category);
    info!(
        "Upload search - filename: {}, size: {}, mimetype: {}, top_k: {:?}, category: {:?}",
        image.filename,
        image.data.len(),
        image.mime_type,
        top_k,
        category
    );

    let request = SearchRequest {
        image: ImageInput::Bytes {
            data: image.data,
            mime_type: image.mime_type,
        },
        top_k,
        category,
    };
    let response = state.engine.search(request).await?;

    info!("Upload search completed, found {} results", response.results.len());
    Ok(HttpResponse::Ok().json(response))
}
