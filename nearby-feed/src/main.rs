//! nearby-feed - nearby venue and event discovery service
//!
//! Serves a ranked discovery feed assembled from the local venue store,
//! topped up from external places and events providers when coverage is thin.

use anyhow::Result;
use clap::Parser;
use nearby_common::config::{
    load_config, resolve_database_path, resolve_setting, EVENTS_API_KEY_ENV, PLACES_API_KEY_ENV,
};
use nearby_common::geo::CityTable;
use nearby_common::time::SystemClock;
use nearby_feed::db::{SqliteInteractionStore, SqliteProfileStore, SqliteRegionalStore};
use nearby_feed::feed::{FeedAssembler, FeedDependencies};
use nearby_feed::services::{
    DisabledEvents, DisabledPlaces, EventsProvider, GooglePlacesClient, LoggingImageWarmer,
    PlacesProvider, TicketmasterEventsClient,
};
use nearby_feed::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nearby-feed")]
#[command(about = "Nearby venue and event discovery feed")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides NEARBY_DATABASE_PATH and the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// HTTP listen address
    #[arg(short, long, env = "NEARBY_BIND")]
    bind: Option<String>,

    /// Places-search API key (overrides NEARBY_PLACES_API_KEY)
    #[arg(long)]
    places_api_key: Option<String>,

    /// Events-discovery API key (overrides NEARBY_EVENTS_API_KEY)
    #[arg(long)]
    events_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting nearby-feed v{}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database: {}", db_path.display());
    let pool = nearby_feed::db::init_database_pool(&db_path).await?;

    let store = Arc::new(SqliteRegionalStore::new(pool.clone()));

    let places_key = resolve_setting(
        "places API key",
        args.places_api_key.as_deref(),
        PLACES_API_KEY_ENV,
        config.providers.places_api_key.as_deref(),
    );
    let places: Arc<dyn PlacesProvider> = match places_key {
        Some(key) => Arc::new(GooglePlacesClient::new(
            config.providers.places_base_url.clone(),
            key,
            config.providers.requests_per_second,
        )?),
        None => {
            warn!("No places API key configured; places search and geocoding disabled");
            Arc::new(DisabledPlaces)
        }
    };

    let events_key = resolve_setting(
        "events API key",
        args.events_api_key.as_deref(),
        EVENTS_API_KEY_ENV,
        config.providers.events_api_key.as_deref(),
    );
    let events: Arc<dyn EventsProvider> = match events_key {
        Some(key) => Arc::new(TicketmasterEventsClient::new(
            config.providers.events_base_url.clone(),
            key,
            config.providers.requests_per_second,
            store.clone(),
        )?),
        None => {
            warn!("No events API key configured; events discovery disabled");
            Arc::new(DisabledEvents)
        }
    };

    let deps = FeedDependencies {
        store,
        interactions: Arc::new(SqliteInteractionStore::new(pool.clone())),
        profiles: Arc::new(SqliteProfileStore::new(pool)),
        places,
        events,
        image_warmer: Arc::new(LoggingImageWarmer),
        clock: Arc::new(SystemClock),
        cities: CityTable::builtin(),
    };
    let assembler = FeedAssembler::new(deps, config.feed.clone(), &config.filters)?;
    info!(
        threshold = config.feed.population_threshold,
        ttl_secs = config.feed.population_ttl_secs,
        "Feed engine ready"
    );

    let app = build_router(AppState::new(Arc::new(assembler)));

    let bind = args.bind.unwrap_or_else(|| config.bind_address.clone());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;

    Ok(())
}
