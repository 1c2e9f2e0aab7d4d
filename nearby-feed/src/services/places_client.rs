//! Places-search and geocoding provider
//!
//! Google Places compatible HTTP client with governor rate limiting. The
//! engine only sees the `PlacesProvider` trait; `DisabledPlaces` stands in
//! when no API key is configured.

use crate::models::{CityState, RawPlace, VibeCategory};
use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use nearby_common::Coordinates;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "nearby-feed/0.1.0";

/// Places client errors
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    /// Provider answered with a non-OK status field
    #[error("Provider status {0}")]
    Status(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Places-search provider seam
#[async_trait]
pub trait PlacesProvider: Send + Sync {
    /// Places around `center` within `radius_m`, optionally steered by a vibe
    async fn search(
        &self,
        center: Coordinates,
        radius_m: f64,
        vibe: Option<VibeCategory>,
    ) -> Result<Vec<RawPlace>, PlacesError>;

    /// Forward geocode free text
    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, PlacesError>;

    /// Reverse geocode a point to city/state
    async fn reverse_geocode(&self, point: Coordinates) -> Result<Option<CityState>, PlacesError>;
}

/// Provider used when no API key is configured; always answers "nothing found"
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledPlaces;

#[async_trait]
impl PlacesProvider for DisabledPlaces {
    async fn search(
        &self,
        _center: Coordinates,
        _radius_m: f64,
        _vibe: Option<VibeCategory>,
    ) -> Result<Vec<RawPlace>, PlacesError> {
        tracing::debug!("Places search skipped: provider not configured");
        Ok(Vec::new())
    }

    async fn geocode(&self, _query: &str) -> Result<Option<Coordinates>, PlacesError> {
        Ok(None)
    }

    async fn reverse_geocode(&self, _point: Coordinates) -> Result<Option<CityState>, PlacesError> {
        Ok(None)
    }
}

/// Place type requested from the provider for each vibe
pub fn search_type_for(vibe: Option<VibeCategory>) -> Option<&'static str> {
    match vibe {
        Some(VibeCategory::Date) => Some("restaurant"),
        Some(VibeCategory::Party) => Some("bar"),
        Some(VibeCategory::Culture) => Some("museum"),
        None => None,
    }
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    place_id: String,
    name: String,
    #[serde(default)]
    vicinity: Option<String>,
    geometry: Geometry,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    price_level: Option<i64>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    photos: Vec<Photo>,
    #[serde(default)]
    opening_hours: Option<serde_json::Value>,
}

impl NearbyResult {
    fn into_raw_place(self) -> RawPlace {
        RawPlace {
            place_id: self.place_id,
            name: self.name,
            address: self.vicinity,
            coordinates: Coordinates::new(self.geometry.location.lat, self.geometry.location.lng),
            rating: self.rating,
            price_level: self.price_level,
            types: self.types,
            photo_reference: self.photos.into_iter().next().map(|p| p.photo_reference),
            opening_hours: self.opening_hours,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Photo {
    photo_reference: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

/// Extract city and state from geocoder address components
///
/// Brazilian results put the municipality under `administrative_area_level_2`
/// more often than `locality`, so both are accepted.
fn city_state_from(components: &[AddressComponent]) -> Option<CityState> {
    let has = |c: &AddressComponent, t: &str| c.types.iter().any(|ct| ct == t);

    let city = components
        .iter()
        .find(|c| has(c, "locality"))
        .or_else(|| components.iter().find(|c| has(c, "administrative_area_level_2")))
        .map(|c| c.long_name.clone())?;
    let state = components
        .iter()
        .find(|c| has(c, "administrative_area_level_1"))
        .map(|c| c.short_name.clone())?;

    Some(CityState::new(city, state))
}

fn check_status(status: &str, error_message: Option<String>) -> Result<bool, PlacesError> {
    match status {
        "OK" => Ok(true),
        "ZERO_RESULTS" => Ok(false),
        other => Err(PlacesError::Status(match error_message {
            Some(msg) => format!("{}: {}", other, msg),
            None => other.to_string(),
        })),
    }
}

/// Google Places compatible client
pub struct GooglePlacesClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    base_url: String,
    api_key: String,
}

impl GooglePlacesClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_second: u32,
    ) -> Result<Self, PlacesError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PlacesError::NetworkError(e.to_string()))?;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PlacesError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, path);
        tracing::debug!(url = %url, "Querying places provider");

        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| PlacesError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlacesError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| PlacesError::ParseError(e.to_string()))
    }

}

#[async_trait]
impl PlacesProvider for GooglePlacesClient {
    async fn search(
        &self,
        center: Coordinates,
        radius_m: f64,
        vibe: Option<VibeCategory>,
    ) -> Result<Vec<RawPlace>, PlacesError> {
        let mut params = vec![
            ("location", format!("{},{}", center.lat, center.lng)),
            ("radius", format!("{}", radius_m.round() as i64)),
        ];
        if let Some(place_type) = search_type_for(vibe) {
            params.push(("type", place_type.to_string()));
        }

        let body: NearbyResponse = self.get_json("place/nearbysearch/json", &params).await?;
        if !check_status(&body.status, body.error_message)? {
            return Ok(Vec::new());
        }

        let places: Vec<RawPlace> = body
            .results
            .into_iter()
            .map(NearbyResult::into_raw_place)
            .collect();

        tracing::info!(
            lat = center.lat,
            lng = center.lng,
            radius_m,
            count = places.len(),
            "Retrieved places from provider"
        );

        Ok(places)
    }

    async fn geocode(&self, query: &str) -> Result<Option<Coordinates>, PlacesError> {
        let body: GeocodeResponse = self
            .get_json("geocode/json", &[("address", query.to_string()), ("region", "br".to_string())])
            .await?;
        if !check_status(&body.status, body.error_message)? {
            return Ok(None);
        }

        Ok(body.results.first().map(|r| {
            Coordinates::new(r.geometry.location.lat, r.geometry.location.lng)
        }))
    }

    async fn reverse_geocode(&self, point: Coordinates) -> Result<Option<CityState>, PlacesError> {
        let body: GeocodeResponse = self
            .get_json("geocode/json", &[("latlng", format!("{},{}", point.lat, point.lng))])
            .await?;
        if !check_status(&body.status, body.error_message)? {
            return Ok(None);
        }

        Ok(body
            .results
            .iter()
            .find_map(|r| city_state_from(&r.address_components)))
    }
}
