//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::cache::{shared, CacheStore, MaintenanceReport, SharedCache, StatsSnapshot};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, HealthResponse, InvalidationResponse, InvalidationScope, KeysQuery,
    KeysResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide cache
    pub cache: SharedCache,
}

impl AppState {
    /// Wraps an already shared cache, so the admin surface and the data
    /// layer observe the same table.
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }

    /// Creates a fresh cache from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(shared(CacheStore::new(config.cache.clone())))
    }
}

/// Rejects blank path selectors, returning the trimmed value.
fn non_blank<'a>(what: &str, raw: &'a str) -> Result<&'a str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CacheError::InvalidRequest(format!("{what} cannot be blank")));
    }
    Ok(trimmed)
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsSnapshot> {
    let cache = state.cache.read().await;
    Json(cache.stats())
}

/// Handler for GET /keys
///
/// Lists stored keys, optionally restricted to one namespace.
pub async fn keys_handler(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> Json<KeysResponse> {
    let keys = state.cache.read().await.keys();
    let keys = match query.namespace() {
        Some(namespace) => keys
            .into_iter()
            .filter(|key| crate::cache::namespace_of(key) == namespace)
            .collect(),
        None => keys,
    };

    Json(KeysResponse::new(keys))
}

/// Handler for POST /maintenance
///
/// Runs one expiry sweep immediately.
pub async fn maintenance_handler(State(state): State<AppState>) -> Json<MaintenanceReport> {
    let report = state.cache.write().await.maintenance();
    Json(report)
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let removed = state.cache.write().await.clear();
    Json(ClearResponse { removed })
}

/// Handler for DELETE /namespaces/:namespace
pub async fn invalidate_namespace_handler(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<InvalidationResponse>> {
    let namespace = non_blank("Namespace", &namespace)?;
    let removed = state.cache.write().await.invalidate_namespace(namespace);

    info!(namespace, removed, "Admin namespace invalidation");
    Ok(Json(InvalidationResponse::new(
        InvalidationScope::Namespace,
        namespace,
        removed,
    )))
}

/// Handler for DELETE /entities/:fragment
///
/// Drops every key mentioning the entity identifier, in every namespace.
pub async fn invalidate_entity_handler(
    State(state): State<AppState>,
    Path(fragment): Path<String>,
) -> Result<Json<InvalidationResponse>> {
    let fragment = non_blank("Entity identifier", &fragment)?;
    let removed = state.cache.write().await.invalidate_matching(fragment);

    info!(fragment, removed, "Admin entity invalidation");
    Ok(Json(InvalidationResponse::new(
        InvalidationScope::Entity,
        fragment,
        removed,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Ttl;
    use crate::config::CacheSettings;
    use serde_json::json;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn test_state() -> AppState {
        let store = CacheStore::new(CacheSettings::unbounded(Duration::from_secs(300)));
        AppState::new(shared(store))
    }

    async fn seed(state: &AppState) {
        let mut cache = state.cache.write().await;
        cache.set("progress:child-1", json!({"level": 2}), Ttl::Default);
        cache.set("achievements:child-1", json!([]), Ttl::Default);
        cache.set("profile:child-2", json!({}), Ttl::Default);
        cache.set("activities:list:limit=10", json!([]), Ttl::Default);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = test_state();
        seed(&state).await;
        state.cache.write().await.get("progress:child-1");

        let response = stats_handler(State(state)).await;
        assert_eq!(response.hits, 1);
        assert_eq!(response.misses, 0);
        assert_eq!(response.size, 4);
    }

    #[tokio::test]
    async fn test_keys_handler_filters_namespace() {
        let state = test_state();
        seed(&state).await;

        let all = keys_handler(State(state.clone()), Query(KeysQuery::default())).await;
        assert_eq!(all.count, 4);

        let query = KeysQuery {
            namespace: Some("progress".to_string()),
        };
        let progress = keys_handler(State(state), Query(query)).await;
        assert_eq!(progress.keys, vec!["progress:child-1".to_string()]);
    }

    #[tokio::test]
    async fn test_clear_handler() {
        let state = test_state();
        seed(&state).await;

        let response = clear_handler(State(state.clone())).await;
        assert_eq!(response.removed, 4);
        assert!(state.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_entity_handler() {
        let state = test_state();
        seed(&state).await;

        let response = assert_ok!(
            invalidate_entity_handler(State(state.clone()), Path("child-1".to_string())).await
        );
        assert_eq!(response.removed, 2);
        assert_eq!(response.scope, InvalidationScope::Entity);
        assert_eq!(state.cache.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_namespace_handler() {
        let state = test_state();
        seed(&state).await;

        let response = assert_ok!(
            invalidate_namespace_handler(State(state), Path("activities".to_string())).await
        );
        assert_eq!(response.removed, 1);
        assert_eq!(response.target, "activities");
    }

    #[tokio::test]
    async fn test_blank_selectors_are_rejected() {
        let state = test_state();
        seed(&state).await;

        assert_err!(invalidate_entity_handler(State(state.clone()), Path("  ".to_string())).await);
        assert_err!(invalidate_namespace_handler(State(state.clone()), Path(String::new())).await);
        assert_eq!(state.cache.read().await.len(), 4);
    }
}
