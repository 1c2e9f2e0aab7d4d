//! Database initialization
//!
//! Creates the SQLite file on first run and applies the schema idempotently,
//! so it is safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database file and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows feed reads to proceed while population writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create every table and index used by the feed engine
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_venues_table(pool).await?;
    create_user_interactions_table(pool).await?;
    create_user_profiles_table(pool).await?;
    Ok(())
}

/// Venues and events, one row each
///
/// Events carry `event_start`; rows without coordinates are stored at (0,0)
/// with `city`/`state` filled in.
pub async fn create_venues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            place_id TEXT UNIQUE,
            external_event_id TEXT UNIQUE,
            name TEXT NOT NULL,
            address TEXT,
            image_url TEXT,
            photo_reference TEXT,
            venue_type TEXT,
            lat REAL NOT NULL DEFAULT 0,
            lng REAL NOT NULL DEFAULT 0,
            event_start TIMESTAMP,
            event_end TIMESTAMP,
            ticket_url TEXT,
            description TEXT,
            rating REAL,
            price_level INTEGER,
            opening_hours TEXT,
            city TEXT,
            state TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            provider_metadata TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_venues_lat_lng ON venues(lat, lng)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_venues_active_created ON venues(is_active, created_at)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_venues_city ON venues(city, state)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Accepted/rejected decisions per user
///
/// `item_ref` holds either a venue id or an external place id.
pub async fn create_user_interactions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_interactions (
            user_id TEXT NOT NULL,
            item_ref TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('accepted', 'rejected')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, item_ref, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Stored location and preference tags per user
///
/// Preference columns hold JSON string arrays.
pub async fn create_user_profiles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_profiles (
            user_id TEXT PRIMARY KEY,
            location TEXT,
            location_lat REAL,
            location_lng REAL,
            drink_preferences TEXT NOT NULL DEFAULT '[]',
            food_preferences TEXT NOT NULL DEFAULT '[]',
            music_preferences TEXT NOT NULL DEFAULT '[]',
            vibe_preferences TEXT NOT NULL DEFAULT '[]',
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
