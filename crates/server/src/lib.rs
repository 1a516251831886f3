//! Visual Search HTTP Server
//!
//! Actix-web REST API over the catalog search engine

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use visearch_common::{AppConfig, Result};

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use state::{build_engine, AppState};

/// JSON extractor settings shared by the server and its tests
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(error::json_error_handler)
}

/// Build state from configuration, preload the catalog and serve until shutdown
pub async fn start_server(config: AppConfig) -> Result<()> {
    let bind_address = config.server_bind_address();
    let json_limit = config.max_upload_bytes;

    let state = Arc::new(AppState::new(config)?);
    state.warm_up().await;

    info!("HTTP server listening on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(Arc::clone(&state)))
            .app_data(json_config(json_limit))
            .configure(routes::configure)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    info!("HTTP server stopped");
    Ok(())
}
