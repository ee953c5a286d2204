//! API Module
//!
//! Admin HTTP surface over the shared cache: health, statistics, key
//! listing, on-demand maintenance and invalidation.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
