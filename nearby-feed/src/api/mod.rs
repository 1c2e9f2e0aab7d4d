//! HTTP API handlers

pub mod feed;
pub mod health;

pub use feed::{feed_routes, get_feed};
pub use health::{health_check, health_routes};
