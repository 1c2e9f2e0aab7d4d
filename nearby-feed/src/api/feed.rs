//! Feed endpoint
//!
//! `GET /feed?lat=..&lng=..&radius=..&user_id=..&vibe=..`. Every parameter is
//! optional; missing or unusable coordinates fall back to the user's saved
//! location and then the default region.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use nearby_common::Coordinates;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::feed::{FeedRequest, FeedResponse};
use crate::models::VibeCategory;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Search radius in metres
    pub radius: Option<f64>,
    pub user_id: Option<String>,
    pub vibe: Option<String>,
}

impl FeedQuery {
    fn into_request(self) -> ApiResult<FeedRequest> {
        let vibe = match self.vibe.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            Some(raw) => Some(raw.parse::<VibeCategory>().map_err(ApiError::BadRequest)?),
            None => None,
        };

        if let Some(radius) = self.radius {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ApiError::BadRequest(format!(
                    "radius must be a positive number of metres, got {}",
                    radius
                )));
            }
        }

        let coordinates = match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        };

        Ok(FeedRequest {
            coordinates,
            radius_m: self.radius,
            user_id: self.user_id.filter(|u| !u.trim().is_empty()),
            vibe,
        })
    }
}

/// GET /feed
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<FeedResponse>> {
    let request = query.into_request()?;
    let response = state.assembler.assemble(request).await?;
    Ok(Json(response))
}

pub fn feed_routes() -> Router<AppState> {
    Router::new().route("/feed", get(get_feed))
}
