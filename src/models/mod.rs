//! Request and Response models for the admin API
//!
//! DTOs serialized to and from the admin endpoints' JSON bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::KeysQuery;
pub use responses::{
    ClearResponse, ErrorResponse, HealthResponse, InvalidationResponse, InvalidationScope,
    KeysResponse,
};
