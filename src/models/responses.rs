//! Response DTOs for the admin API

use serde::Serialize;

/// Which selector an invalidation used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationScope {
    /// Every key under `namespace:`
    Namespace,
    /// Every key containing an entity identifier
    Entity,
}

/// Response body for the invalidation endpoints
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationResponse {
    pub scope: InvalidationScope,
    /// The namespace or fragment that was matched
    pub target: String,
    /// Number of entries removed
    pub removed: usize,
}

impl InvalidationResponse {
    pub fn new(scope: InvalidationScope, target: impl Into<String>, removed: usize) -> Self {
        Self {
            scope,
            target: target.into(),
            removed,
        }
    }
}

/// Response body for `DELETE /cache`
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// Response body for `GET /keys`
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<String>,
}

impl KeysResponse {
    /// Sorts the keys so listings are stable between calls.
    pub fn new(mut keys: Vec<String>) -> Self {
        keys.sort_unstable();
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
