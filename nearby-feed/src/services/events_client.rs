//! Events-discovery provider
//!
//! Ticketmaster Discovery compatible client. Unlike places search, this
//! adapter writes what it finds straight into the regional store and only
//! reports how many events it saw.

use crate::db::RegionalStore;
use crate::models::{CityState, NewVenue};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use nearby_common::Coordinates;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "nearby-feed/0.1.0";
const SEARCH_RADIUS_KM: u32 = 50;
const PAGE_SIZE: u32 = 50;

/// Events client errors
#[derive(Debug, Error)]
pub enum EventsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Store error: {0}")]
    Store(#[from] nearby_common::Error),
}

/// Events-discovery seam; implementations persist events themselves
#[async_trait]
pub trait EventsProvider: Send + Sync {
    /// Discover events near `center` in `city`; returns how many were stored
    async fn discover(&self, center: Coordinates, city: &CityState) -> Result<usize, EventsError>;
}

/// Provider used when no API key is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEvents;

#[async_trait]
impl EventsProvider for DisabledEvents {
    async fn discover(&self, _center: Coordinates, _city: &CityState) -> Result<usize, EventsError> {
        tracing::debug!("Events discovery skipped: provider not configured");
        Ok(0)
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedEvents>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedEvents {
    #[serde(default)]
    events: Vec<TmEvent>,
}

#[derive(Debug, Deserialize)]
struct TmEvent {
    id: String,
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    info: Option<String>,
    #[serde(default)]
    dates: Option<TmDates>,
    #[serde(default)]
    images: Vec<TmImage>,
    #[serde(default)]
    classifications: Vec<TmClassification>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<TmEventEmbedded>,
}

#[derive(Debug, Deserialize)]
struct TmDates {
    start: Option<TmStart>,
    #[serde(default)]
    end: Option<TmStart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TmStart {
    #[serde(default)]
    date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    local_date: Option<NaiveDate>,
}

impl TmStart {
    fn instant(&self) -> Option<DateTime<Utc>> {
        self.date_time.or_else(|| {
            self.local_date
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
    }
}

#[derive(Debug, Deserialize)]
struct TmImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct TmClassification {
    #[serde(default)]
    segment: Option<TmNamed>,
    #[serde(default)]
    genre: Option<TmNamed>,
}

#[derive(Debug, Deserialize)]
struct TmNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TmEventEmbedded {
    #[serde(default)]
    venues: Vec<TmVenue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TmVenue {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<TmAddress>,
    #[serde(default)]
    city: Option<TmNamed>,
    #[serde(default)]
    state: Option<TmState>,
    #[serde(default)]
    location: Option<TmLocation>,
}

#[derive(Debug, Deserialize)]
struct TmAddress {
    #[serde(default)]
    line1: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TmState {
    #[serde(default)]
    state_code: Option<String>,
}

/// Ticketmaster sends coordinates as strings
#[derive(Debug, Deserialize)]
struct TmLocation {
    latitude: String,
    longitude: String,
}

/// Convert one provider event into a store row
///
/// Events without usable venue coordinates are anchored at (0,0) and keep the
/// requested city/state so the feed can place them by city. Events without a
/// start date are dropped since a row without one is not an event.
fn event_to_venue(event: TmEvent, fallback_city: &CityState) -> Option<NewVenue> {
    let dates = event.dates.as_ref();
    let start = dates.and_then(|d| d.start.as_ref()).and_then(TmStart::instant)?;
    let end = dates.and_then(|d| d.end.as_ref()).and_then(TmStart::instant);

    let venue = event.embedded.as_ref().and_then(|e| e.venues.first());
    let coordinates = venue
        .and_then(|v| v.location.as_ref())
        .and_then(|l| Some(Coordinates::new(l.latitude.parse().ok()?, l.longitude.parse().ok()?)))
        .filter(|c| c.is_valid())
        .unwrap_or(Coordinates::new(0.0, 0.0));

    let city = venue
        .and_then(|v| v.city.as_ref())
        .map(|c| c.name.clone())
        .unwrap_or_else(|| fallback_city.city.clone());
    let state = venue
        .and_then(|v| v.state.as_ref())
        .and_then(|s| s.state_code.clone())
        .unwrap_or_else(|| fallback_city.state.clone());

    let segment = event
        .classifications
        .first()
        .and_then(|c| c.segment.as_ref())
        .map(|s| s.name.clone());
    let genre = event
        .classifications
        .first()
        .and_then(|c| c.genre.as_ref())
        .map(|g| g.name.clone());

    let address = venue.and_then(|v| {
        let parts: Vec<String> = [v.name.clone(), v.address.as_ref().and_then(|a| a.line1.clone())]
            .into_iter()
            .flatten()
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" - "))
        }
    });

    let mut types: Vec<String> = Vec::new();
    types.extend(segment.iter().map(|s| s.to_lowercase()));
    types.extend(genre.iter().map(|g| g.to_lowercase()));

    Some(NewVenue {
        place_id: None,
        external_event_id: Some(event.id),
        name: event.name,
        address,
        image_url: event.images.first().map(|i| i.url.clone()),
        photo_reference: None,
        venue_type: segment.map(|s| s.to_lowercase()),
        coordinates,
        event_start: Some(start),
        event_end: end,
        ticket_url: event.url,
        description: event.info,
        rating: None,
        price_level: None,
        opening_hours: None,
        city: Some(city),
        state: Some(state),
        provider_metadata: serde_json::json!({
            "source": "events",
            "types": types,
        }),
    })
}

/// Ticketmaster Discovery compatible client
pub struct TicketmasterEventsClient {
    http_client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    base_url: String,
    api_key: String,
    store: Arc<dyn RegionalStore>,
}

impl TicketmasterEventsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        requests_per_second: u32,
        store: Arc<dyn RegionalStore>,
    ) -> Result<Self, EventsError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EventsError::NetworkError(e.to_string()))?;

        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            store,
        })
    }
}

#[async_trait]
impl EventsProvider for TicketmasterEventsClient {
    async fn discover(&self, center: Coordinates, city: &CityState) -> Result<usize, EventsError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/events.json", self.base_url);
        tracing::debug!(url = %url, city = %city, "Querying events provider");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("apikey", self.api_key.clone()),
                ("latlong", format!("{},{}", center.lat, center.lng)),
                ("radius", SEARCH_RADIUS_KM.to_string()),
                ("unit", "km".to_string()),
                ("city", city.city.clone()),
                ("stateCode", city.state.clone()),
                ("countryCode", "BR".to_string()),
                ("size", PAGE_SIZE.to_string()),
                ("sort", "date,asc".to_string()),
            ])
            .send()
            .await
            .map_err(|e| EventsError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EventsError::ApiError(status.as_u16(), error_text));
        }

        let body: DiscoveryResponse = response
            .json()
            .await
            .map_err(|e| EventsError::ParseError(e.to_string()))?;

        let events: Vec<NewVenue> = body
            .embedded
            .map(|e| e.events)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|e| event_to_venue(e, city))
            .collect();

        if events.is_empty() {
            tracing::info!(city = %city, "Events provider returned no events");
            return Ok(0);
        }

        let written = self.store.upsert_events(&events).await?;
        tracing::info!(city = %city, written, "Stored events from provider");
        Ok(written)
    }
}
