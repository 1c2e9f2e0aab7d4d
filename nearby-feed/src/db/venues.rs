//! Regional venue/event store
//!
//! The engine only ever reads rectangular regions and writes back what the
//! external providers return. `RegionalStore` is the seam; `SqliteRegionalStore`
//! is the production implementation over the shared `venues` table.

use crate::models::{FeedItem, NewVenue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nearby_common::geo::BoundingBox;
use nearby_common::{Coordinates, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Venue row as read from the store
#[derive(Debug, Clone, PartialEq)]
pub struct VenueRow {
    pub id: String,
    pub place_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub venue_type: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub event_start: Option<DateTime<Utc>>,
    pub event_end: Option<DateTime<Utc>>,
    pub ticket_url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub price_level: Option<i64>,
    pub opening_hours: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub is_active: bool,
    pub provider_metadata: Option<String>,
}

impl VenueRow {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    pub fn is_event(&self) -> bool {
        self.event_start.is_some()
    }

    /// Provider type tags stored under `provider_metadata.types`
    pub fn provider_types(&self) -> Vec<String> {
        self.provider_metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(raw).ok())
            .and_then(|meta| {
                meta.get("types").and_then(|t| t.as_array()).map(|types| {
                    types
                        .iter()
                        .filter_map(|t| t.as_str().map(str::to_string))
                        .collect()
                })
            })
            .unwrap_or_default()
    }

    /// Map to a feed item at the given distance from the query point
    pub fn into_feed_item(self, distance_km: f64) -> FeedItem {
        let provider_types = self.provider_types();
        let opening_hours = self
            .opening_hours
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        let coordinates = self.coordinates();

        FeedItem {
            is_event: self.event_start.is_some(),
            id: self.id,
            place_id: self.place_id,
            name: self.name,
            address: self.address,
            image_url: self.image_url,
            description: self.description,
            item_type: self.venue_type,
            provider_types,
            coordinates,
            rating: self.rating,
            price_level: self.price_level,
            opening_hours,
            city: self.city,
            state: self.state,
            ticket_url: self.ticket_url,
            distance_km: distance_km.max(0.0),
            event_date: self.event_start,
            event_end: self.event_end,
            match_score: None,
        }
    }
}

/// Geo-indexed venue/event table
#[async_trait]
pub trait RegionalStore: Send + Sync {
    /// Active rows inside `bbox`, newest first, at most `limit`
    async fn fetch_in_box(&self, bbox: &BoundingBox, limit: u32) -> Result<Vec<VenueRow>>;

    /// Active events stored at (0,0) for one city, newest first
    async fn fetch_unlocated_events(&self, city: &str, state: &str, limit: u32) -> Result<Vec<VenueRow>>;

    /// Insert or refresh places by `place_id`; returns ids of newly created rows
    async fn upsert_places(&self, venues: &[NewVenue]) -> Result<Vec<String>>;

    /// Insert or refresh events by `external_event_id`; returns rows written
    async fn upsert_events(&self, events: &[NewVenue]) -> Result<usize>;
}

const VENUE_COLUMNS: &str = r#"
    id, place_id, name, address, image_url, venue_type, lat, lng,
    event_start, event_end, ticket_url, description, rating, price_level,
    opening_hours, city, state, is_active, created_at, updated_at, provider_metadata
"#;

/// `RegionalStore` over the SQLite `venues` table
#[derive(Clone)]
pub struct SqliteRegionalStore {
    pool: SqlitePool,
}

impl SqliteRegionalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Mark a row inactive so region reads skip it
    pub async fn deactivate(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE venues SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn venue_from_row(row: &SqliteRow) -> Result<VenueRow> {
    Ok(VenueRow {
        id: row.try_get("id")?,
        place_id: row.try_get("place_id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        image_url: row.try_get("image_url")?,
        venue_type: row.try_get("venue_type")?,
        lat: row.try_get("lat")?,
        lng: row.try_get("lng")?,
        event_start: row.try_get("event_start")?,
        event_end: row.try_get("event_end")?,
        ticket_url: row.try_get("ticket_url")?,
        description: row.try_get("description")?,
        rating: row.try_get("rating")?,
        price_level: row.try_get("price_level")?,
        opening_hours: row.try_get("opening_hours")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        is_active: row.try_get("is_active")?,
        provider_metadata: row.try_get("provider_metadata")?,
    })
}

fn json_text(value: &Option<serde_json::Value>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

#[async_trait]
impl RegionalStore for SqliteRegionalStore {
    async fn fetch_in_box(&self, bbox: &BoundingBox, limit: u32) -> Result<Vec<VenueRow>> {
        let sql = format!(
            r#"
            SELECT {VENUE_COLUMNS}
            FROM venues
            WHERE is_active = 1
              AND lat BETWEEN ? AND ?
              AND lng BETWEEN ? AND ?
            ORDER BY created_at DESC
            LIMIT ?
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(bbox.min_lat)
            .bind(bbox.max_lat)
            .bind(bbox.min_lng)
            .bind(bbox.max_lng)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(venue_from_row).collect()
    }

    async fn fetch_unlocated_events(&self, city: &str, state: &str, limit: u32) -> Result<Vec<VenueRow>> {
        let sql = format!(
            r#"
            SELECT {VENUE_COLUMNS}
            FROM venues
            WHERE is_active = 1
              AND event_start IS NOT NULL
              AND lat = 0 AND lng = 0
              AND city = ? COLLATE NOCASE
              AND state = ? COLLATE NOCASE
            ORDER BY created_at DESC
            LIMIT ?
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(city)
            .bind(state)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(venue_from_row).collect()
    }

    async fn upsert_places(&self, venues: &[NewVenue]) -> Result<Vec<String>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::new();
        let now = Utc::now();

        for venue in venues {
            let Some(place_id) = venue.place_id.as_deref() else {
                continue;
            };

            let existing: Option<String> =
                sqlx::query_scalar("SELECT id FROM venues WHERE place_id = ?")
                    .bind(place_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match existing {
                Some(id) => {
                    sqlx::query(
                        r#"
                        UPDATE venues SET
                            name = ?, address = ?, rating = ?, price_level = ?,
                            opening_hours = ?, provider_metadata = ?,
                            photo_reference = COALESCE(?, photo_reference),
                            updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(&venue.name)
                    .bind(&venue.address)
                    .bind(venue.rating)
                    .bind(venue.price_level)
                    .bind(json_text(&venue.opening_hours))
                    .bind(venue.provider_metadata.to_string())
                    .bind(&venue.photo_reference)
                    .bind(now)
                    .bind(&id)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    insert_venue(&mut tx, &id, venue, now).await?;
                    created.push(id);
                }
            }
        }

        tx.commit().await?;
        tracing::debug!(
            received = venues.len(),
            created = created.len(),
            "Upserted places into regional store"
        );
        Ok(created)
    }

    async fn upsert_events(&self, events: &[NewVenue]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        let now = Utc::now();

        for event in events {
            let Some(external_id) = event.external_event_id.as_deref() else {
                continue;
            };

            let existing: Option<String> =
                sqlx::query_scalar("SELECT id FROM venues WHERE external_event_id = ?")
                    .bind(external_id)
                    .fetch_optional(&mut *tx)
                    .await?;

            match existing {
                Some(id) => {
                    sqlx::query(
                        r#"
                        UPDATE venues SET
                            name = ?, event_start = ?, event_end = ?, ticket_url = ?,
                            description = ?, image_url = ?, is_active = 1, updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(&event.name)
                    .bind(event.event_start)
                    .bind(event.event_end)
                    .bind(&event.ticket_url)
                    .bind(&event.description)
                    .bind(&event.image_url)
                    .bind(now)
                    .bind(&id)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    insert_venue(&mut tx, &id, event, now).await?;
                }
            }
            written += 1;
        }

        tx.commit().await?;
        Ok(written)
    }
}

async fn insert_venue(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &str,
    venue: &NewVenue,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO venues (
            id, place_id, external_event_id, name, address, image_url, photo_reference,
            venue_type, lat, lng, event_start, event_end, ticket_url, description,
            rating, price_level, opening_hours, city, state, is_active, created_at,
            updated_at, provider_metadata
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&venue.place_id)
    .bind(&venue.external_event_id)
    .bind(&venue.name)
    .bind(&venue.address)
    .bind(&venue.image_url)
    .bind(&venue.photo_reference)
    .bind(&venue.venue_type)
    .bind(venue.coordinates.lat)
    .bind(venue.coordinates.lng)
    .bind(venue.event_start)
    .bind(venue.event_end)
    .bind(&venue.ticket_url)
    .bind(&venue.description)
    .bind(venue.rating)
    .bind(venue.price_level)
    .bind(json_text(&venue.opening_hours))
    .bind(&venue.city)
    .bind(&venue.state)
    .bind(now)
    .bind(now)
    .bind(venue.provider_metadata.to_string())
    .execute(&mut **tx)
    .await?;

    Ok(())
}
