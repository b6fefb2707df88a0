use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::service::RiskService;

pub fn app(service: Arc<RiskService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router(service))
        .layer(cors)
}

pub async fn run(service: Arc<RiskService>, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let purge = service.spawn_cache_purge();
    tracing::info!("Web server running at http://localhost:{}", port);
    let served = axum::serve(listener, app(service))
        .await
        .context("Web server stopped unexpectedly");
    purge.abort();
    served
}
