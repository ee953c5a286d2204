//! API Routes
//!
//! Configures the Axum router with the cache admin endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, health_handler, invalidate_entity_handler, invalidate_namespace_handler,
    keys_handler, maintenance_handler, stats_handler, AppState,
};

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /health` - Health check
/// - `GET /stats` - Cache statistics
/// - `GET /keys?namespace=` - Stored keys
/// - `POST /maintenance` - Run an expiry sweep now
/// - `DELETE /cache` - Clear everything
/// - `DELETE /namespaces/:namespace` - Invalidate a namespace
/// - `DELETE /entities/:fragment` - Invalidate an entity across namespaces
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/keys", get(keys_handler))
        .route("/maintenance", post(maintenance_handler))
        .route("/cache", delete(clear_handler))
        .route("/namespaces/:namespace", delete(invalidate_namespace_handler))
        .route("/entities/:fragment", delete(invalidate_entity_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
