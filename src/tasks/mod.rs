//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache lives.
//!
//! # Tasks
//! - Maintenance sweep: removes expired cache entries at a fixed interval

mod sweeper;

pub use sweeper::{spawn_sweep_task, Sweeper};
