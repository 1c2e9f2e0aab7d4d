//! Store adapters for nearby-feed
//!
//! Each external collaborator is reached through a trait so the engine can
//! be exercised against in-memory fakes. The SQLite implementations share the
//! schema created by `nearby_common::db`.

pub mod interactions;
pub mod profiles;
pub mod venues;

pub use interactions::{InteractionKind, InteractionStore, SqliteInteractionStore};
pub use profiles::{ProfileStore, SqliteProfileStore};
pub use venues::{RegionalStore, SqliteRegionalStore, VenueRow};

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open the shared database and make sure the feed tables exist
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    let pool = nearby_common::db::init_database(db_path).await?;
    tracing::info!("Database tables initialized (venues, user_interactions, user_profiles)");
    Ok(pool)
}
