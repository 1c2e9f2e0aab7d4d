//! Shared test fixtures: in-memory SQLite stores and scripted providers

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nearby_common::config::{FeedSettings, FilterRules};
use nearby_common::geo::{CityTable, EARTH_RADIUS_KM};
use nearby_common::time::ManualClock;
use nearby_common::Coordinates;
use nearby_feed::db::{RegionalStore, SqliteInteractionStore, SqliteProfileStore, SqliteRegionalStore};
use nearby_feed::feed::{FeedAssembler, FeedDependencies};
use nearby_feed::models::{CityState, NewVenue, RawPlace, VibeCategory};
use nearby_feed::services::{EventsError, EventsProvider, ImageWarmer, PlacesError, PlacesProvider};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SAO_PAULO: Coordinates = Coordinates::new(-23.5505, -46.6333);

/// Fresh in-memory database with the full schema
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");
    nearby_common::db::create_schema(&pool)
        .await
        .expect("Should create schema");
    pool
}

/// Point `north_km` / `east_km` away from `from`
pub fn offset(from: Coordinates, north_km: f64, east_km: f64) -> Coordinates {
    let lat = from.lat + (north_km / EARTH_RADIUS_KM).to_degrees();
    let lng = from.lng + (east_km / (EARTH_RADIUS_KM * from.lat.to_radians().cos())).to_degrees();
    Coordinates::new(lat, lng)
}

pub fn raw_place(place_id: &str, name: &str, at: Coordinates, rating: Option<f64>, types: &[&str]) -> RawPlace {
    RawPlace {
        place_id: place_id.to_string(),
        name: name.to_string(),
        address: Some("Rua Augusta, São Paulo".to_string()),
        coordinates: at,
        rating,
        price_level: Some(2),
        types: types.iter().map(|t| t.to_string()).collect(),
        photo_reference: None,
        opening_hours: None,
    }
}

pub fn venue(place_id: &str, name: &str, at: Coordinates, rating: f64, kind: &str) -> NewVenue {
    NewVenue::from_place(&raw_place(place_id, name, at, Some(rating), &[kind, "establishment"]))
}

pub fn event(external_id: &str, name: &str, at: Coordinates, start: DateTime<Utc>) -> NewVenue {
    NewVenue {
        place_id: None,
        external_event_id: Some(external_id.to_string()),
        name: name.to_string(),
        address: None,
        image_url: None,
        photo_reference: None,
        venue_type: Some("music".to_string()),
        coordinates: at,
        event_start: Some(start),
        event_end: None,
        ticket_url: Some(format!("https://tickets.example/{}", external_id)),
        description: None,
        rating: None,
        price_level: None,
        opening_hours: None,
        city: Some("São Paulo".to_string()),
        state: Some("SP".to_string()),
        provider_metadata: serde_json::json!({"source": "events", "types": ["music"]}),
    }
}

/// Places provider returning a scripted result set
#[derive(Default)]
pub struct FakePlaces {
    results: Mutex<Vec<RawPlace>>,
    geocoded: Mutex<Option<Coordinates>>,
    fail: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    pub searches: AtomicUsize,
}

impl FakePlaces {
    pub fn set_results(&self, results: Vec<RawPlace>) {
        *self.results.lock().unwrap() = results;
    }

    pub fn set_geocoded(&self, point: Coordinates) {
        *self.geocoded.lock().unwrap() = Some(point);
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlacesProvider for FakePlaces {
    async fn search(
        &self,
        _center: Coordinates,
        _radius_m: f64,
        _vibe: Option<VibeCategory>,
    ) -> Result<Vec<RawPlace>, PlacesError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail.lock().unwrap() {
            return Err(PlacesError::ApiError(503, "places unavailable".to_string()));
        }
        Ok(self.results.lock().unwrap().clone())
    }

    async fn geocode(&self, _query: &str) -> Result<Option<Coordinates>, PlacesError> {
        Ok(*self.geocoded.lock().unwrap())
    }

    async fn reverse_geocode(&self, _point: Coordinates) -> Result<Option<CityState>, PlacesError> {
        if *self.fail.lock().unwrap() {
            return Err(PlacesError::NetworkError("offline".to_string()));
        }
        Ok(None)
    }
}

/// Events provider that writes a scripted batch into the store
pub struct FakeEvents {
    store: Arc<dyn RegionalStore>,
    batch: Mutex<Vec<NewVenue>>,
    fail: Mutex<bool>,
    pub calls: AtomicUsize,
    pub cities: Mutex<Vec<CityState>>,
}

impl FakeEvents {
    pub fn new(store: Arc<dyn RegionalStore>) -> Self {
        Self {
            store,
            batch: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
            calls: AtomicUsize::new(0),
            cities: Mutex::new(Vec::new()),
        }
    }

    pub fn set_batch(&self, batch: Vec<NewVenue>) {
        *self.batch.lock().unwrap() = batch;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventsProvider for FakeEvents {
    async fn discover(&self, _center: Coordinates, city: &CityState) -> Result<usize, EventsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cities.lock().unwrap().push(city.clone());
        if *self.fail.lock().unwrap() {
            return Err(EventsError::ApiError(500, "events unavailable".to_string()));
        }
        let batch = self.batch.lock().unwrap().clone();
        Ok(self.store.upsert_events(&batch).await?)
    }
}

/// Image hook recording every id it was handed
#[derive(Default)]
pub struct RecordingWarmer {
    pub ids: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageWarmer for RecordingWarmer {
    async fn warm(&self, venue_ids: Vec<String>) {
        self.ids.lock().unwrap().extend(venue_ids);
    }
}

/// Real SQLite stores plus scripted providers
pub struct Harness {
    pub pool: SqlitePool,
    pub store: Arc<SqliteRegionalStore>,
    pub interactions: Arc<SqliteInteractionStore>,
    pub profiles: Arc<SqliteProfileStore>,
    pub places: Arc<FakePlaces>,
    pub events: Arc<FakeEvents>,
    pub warmer: Arc<RecordingWarmer>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = memory_pool().await;
        let store = Arc::new(SqliteRegionalStore::new(pool.clone()));
        Self {
            interactions: Arc::new(SqliteInteractionStore::new(pool.clone())),
            profiles: Arc::new(SqliteProfileStore::new(pool.clone())),
            places: Arc::new(FakePlaces::default()),
            events: Arc::new(FakeEvents::new(store.clone())),
            warmer: Arc::new(RecordingWarmer::default()),
            clock: Arc::new(ManualClock::default()),
            store,
            pool,
        }
    }

    pub fn assembler(&self) -> FeedAssembler {
        self.assembler_with(FeedSettings::default())
    }

    pub fn assembler_with(&self, settings: FeedSettings) -> FeedAssembler {
        let deps = FeedDependencies {
            store: self.store.clone(),
            interactions: self.interactions.clone(),
            profiles: self.profiles.clone(),
            places: self.places.clone(),
            events: self.events.clone(),
            image_warmer: self.warmer.clone(),
            clock: self.clock.clone(),
            cities: CityTable::builtin(),
        };
        FeedAssembler::new(deps, settings, &FilterRules::default()).expect("Default rules should compile")
    }

    /// Insert venues, returning their store ids in input order
    pub async fn seed(&self, venues: Vec<NewVenue>) -> Vec<String> {
        self.store.upsert_places(&venues).await.expect("Should seed venues")
    }

    pub async fn seed_events(&self, events: Vec<NewVenue>) {
        self.store.upsert_events(&events).await.expect("Should seed events");
    }
}
