//! nearby-feed library interface
//!
//! Exposes the feed engine, its store adapters and provider clients, and the
//! HTTP router for integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, FeedError};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::feed::FeedAssembler;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<FeedAssembler>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(assembler: Arc<FeedAssembler>) -> Self {
        Self {
            assembler,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::feed_routes())
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
