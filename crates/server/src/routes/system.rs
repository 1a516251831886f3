use actix_web::{get, HttpResponse};

use crate::types::HealthResponse;

/// GET /api/health - Liveness probe
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
