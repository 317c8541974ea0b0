pub mod response;

use crate::config::Config;
use crate::features::{self, catalog_import::ImportContext};
use crate::middleware;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;

/// Builds the full application: health endpoints, `/api/v1` features and
/// the middleware stack
pub fn create_router(pool: PgPool, ctx: ImportContext, config: &Config) -> Router {
    let health_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(pool);

    health_routes
        .nest("/api/v1", features::router(ctx))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Catalog Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Reports database connectivity
async fn health_check(State(pool): State<PgPool>) -> Result<Response, StatusCode> {
    match sqlx::query("SELECT 1").execute(&pool).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}
