//! User profile reads: stored location and preference tags

use crate::models::{StoredLocation, UserPreferences};
use async_trait::async_trait;
use nearby_common::{Coordinates, Result};
use serde::Deserialize;
use sqlx::{Row, SqlitePool};

/// Read side of the user-profile subsystem
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>>;
    async fn stored_location(&self, user_id: &str) -> Result<Option<StoredLocation>>;
}

/// Location column may hold a JSON object instead of free text
#[derive(Debug, Deserialize)]
struct LocationJson {
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
}

/// Interpret the raw profile location columns
pub fn parse_stored_location(
    location: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
) -> Option<StoredLocation> {
    let explicit = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)).filter(|c| c.is_valid() && !c.is_origin()),
        _ => None,
    };

    let text = location.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());

    if let Some(raw) = text.as_deref().filter(|t| t.starts_with('{')) {
        if let Ok(parsed) = serde_json::from_str::<LocationJson>(raw) {
            let embedded = match (parsed.lat, parsed.lng) {
                (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
                _ => None,
            };
            return Some(StoredLocation::Structured {
                address: parsed.address,
                city: parsed.city,
                state: parsed.state,
                coordinates: explicit.or(embedded),
            });
        }
    }

    match (text, explicit) {
        (text, Some(coordinates)) => Some(StoredLocation::Structured {
            address: text,
            city: None,
            state: None,
            coordinates: Some(coordinates),
        }),
        (Some(text), None) => Some(StoredLocation::Text(text)),
        (None, None) => None,
    }
}

fn tags(raw: Option<String>) -> Vec<String> {
    raw.and_then(|r| serde_json::from_str::<Vec<String>>(&r).ok())
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `ProfileStore` over the SQLite `user_profiles` table
#[derive(Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create or replace a profile row
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        location: Option<&str>,
        coordinates: Option<Coordinates>,
        preferences: &UserPreferences,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                user_id, location, location_lat, location_lng,
                drink_preferences, food_preferences, music_preferences, vibe_preferences,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(user_id) DO UPDATE SET
                location = excluded.location,
                location_lat = excluded.location_lat,
                location_lng = excluded.location_lng,
                drink_preferences = excluded.drink_preferences,
                food_preferences = excluded.food_preferences,
                music_preferences = excluded.music_preferences,
                vibe_preferences = excluded.vibe_preferences,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(user_id)
        .bind(location)
        .bind(coordinates.map(|c| c.lat))
        .bind(coordinates.map(|c| c.lng))
        .bind(serde_json::to_string(&preferences.drinks).unwrap_or_else(|_| "[]".to_string()))
        .bind(serde_json::to_string(&preferences.foods).unwrap_or_else(|_| "[]".to_string()))
        .bind(serde_json::to_string(&preferences.music).unwrap_or_else(|_| "[]".to_string()))
        .bind(serde_json::to_string(&preferences.vibes).unwrap_or_else(|_| "[]".to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        let row = sqlx::query(
            r#"
            SELECT drink_preferences, food_preferences, music_preferences, vibe_preferences
            FROM user_profiles
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let preferences = UserPreferences {
            drinks: tags(row.try_get("drink_preferences")?),
            foods: tags(row.try_get("food_preferences")?),
            music: tags(row.try_get("music_preferences")?),
            vibes: tags(row.try_get("vibe_preferences")?),
        };

        Ok(Some(preferences).filter(|p| !p.is_empty()))
    }

    async fn stored_location(&self, user_id: &str) -> Result<Option<StoredLocation>> {
        let row = sqlx::query(
            "SELECT location, location_lat, location_lng FROM user_profiles WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(parse_stored_location(
                row.try_get("location")?,
                row.try_get("location_lat")?,
                row.try_get("location_lng")?,
            )),
            None => Ok(None),
        }
    }
}
