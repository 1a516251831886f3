use actix_web::web;

pub mod catalog;
pub mod search;
pub mod system;
pub mod upload;

/// Register all API routes under `/api`
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(search::search_by_url)
            .service(upload::search_by_upload)
            .service(catalog::catalog_stats)
            .service(catalog::catalog_refresh)
            .service(catalog::catalog_invalidate)
            .service(system::health),
    );
}
