//! Configuration loading
//!
//! Settings are resolved with the following priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file is never fatal: a warning is logged and
//! compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "NEARBY_CONFIG";
/// Environment variable overriding the database path
pub const DATABASE_PATH_ENV: &str = "NEARBY_DATABASE_PATH";
/// Environment variable carrying the places-search API key
pub const PLACES_API_KEY_ENV: &str = "NEARBY_PLACES_API_KEY";
/// Environment variable carrying the events-discovery API key
pub const EVENTS_API_KEY_ENV: &str = "NEARBY_EVENTS_API_KEY";

/// Top-level TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// HTTP listen address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub providers: ProviderConfig,

    #[serde(default)]
    pub feed: FeedSettings,

    #[serde(default)]
    pub filters: FilterRules,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            providers: ProviderConfig::default(),
            feed: FeedSettings::default(),
            filters: FilterRules::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// External provider endpoints and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub places_api_key: Option<String>,

    #[serde(default = "default_places_base_url")]
    pub places_base_url: String,

    #[serde(default)]
    pub events_api_key: Option<String>,

    #[serde(default = "default_events_base_url")]
    pub events_base_url: String,

    /// Outbound requests per second allowed for each provider
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            places_api_key: None,
            places_base_url: default_places_base_url(),
            events_api_key: None,
            events_base_url: default_events_base_url(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

/// Feed assembly tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    /// Row cap for a single regional store read
    pub page_size: u32,
    /// Radius used when the request does not carry one
    pub default_radius_m: f64,
    /// Below this many items the population coordinator is consulted
    pub population_threshold: usize,
    /// Minimum time between two populations of the same region signature
    pub population_ttl_secs: u64,
    /// Below this many items the search widens to `expansion_radius_m`
    pub expansion_threshold: usize,
    pub expansion_radius_m: f64,
    /// Events further than this are dropped
    pub event_max_distance_km: f64,
    /// Multiplier applied to the radius when keeping non-event items
    pub radius_buffer: f64,
    /// Distance reported for city-anchored events without coordinates
    pub city_event_distance_km: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            default_radius_m: 5_000.0,
            population_threshold: 5,
            population_ttl_secs: 15 * 60,
            expansion_threshold: 3,
            expansion_radius_m: 20_000.0,
            event_max_distance_km: 50.0,
            radius_buffer: 1.3,
            city_event_distance_km: 1.0,
        }
    }
}

/// Block and allow lists used by the quality and vibe filters
///
/// Name patterns are regular expressions matched case-insensitively;
/// keyword and type lists are plain substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Venues rated below this are dropped (unrated venues are kept)
    pub min_rating: f64,
    pub blocked_name_patterns: Vec<String>,
    pub vibe: VibeRules,
}

/// Per-category lists for the vibe filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VibeRules {
    /// Dropped for every category, even when otherwise matching
    pub blocked_keywords: Vec<String>,
    pub date: CategoryRules,
    pub party: CategoryRules,
    pub culture: CategoryRules,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRules {
    pub types: Vec<String>,
    pub keywords: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            min_rating: 4.0,
            blocked_name_patterns: strings(&[
                r"\bplayground\b",
                r"parquinho",
                r"\bescola\b",
                r"\bschool\b",
                r"col[eé]gio",
                r"creche",
                r"hospital",
                r"cl[ií]nica",
                r"\bclinic\b",
                r"pronto[- ]socorro",
                r"ponto de [oô]nibus",
                r"\bbus stop\b",
                r"terminal rodovi[aá]rio",
                r"esta[cç][aã]o (de )?metr[oô]",
                r"\bsubway station\b",
                r"cemit[eé]rio",
                r"\bcemetery\b",
                r"prefeitura",
                r"\bcity hall\b",
                r"subprefeitura",
                r"poupatempo",
                r"cart[oó]rio",
                r"delegacia",
                r"f[oó]rum",
                r"posto de gasolina",
                r"\bgas station\b",
            ]),
            vibe: VibeRules::default(),
        }
    }
}

impl Default for VibeRules {
    fn default() -> Self {
        Self {
            blocked_keywords: strings(&[
                "hospital",
                "clínica",
                "clinica",
                "clinic",
                "médico",
                "medical",
                "dentista",
                "dentist",
                "farmácia",
                "pharmacy",
                "escola",
                "school",
                "faculdade",
                "universidade",
                "university",
                "banco",
                "bank",
                "cartório",
                "prefeitura",
                "government",
                "delegacia",
                "academia",
                "gym",
                "fitness",
                "crossfit",
                "laboratório",
            ]),
            date: CategoryRules {
                types: strings(&[
                    "restaurant",
                    "cafe",
                    "wine_bar",
                    "bar",
                    "bakery",
                    "dessert",
                    "ice_cream",
                    "park",
                    "art_gallery",
                    "movie_theater",
                    "spa",
                ]),
                keywords: strings(&[
                    "romântico",
                    "romantic",
                    "jantar",
                    "dinner",
                    "vinho",
                    "wine",
                    "rooftop",
                    "bistrô",
                    "bistro",
                    "fondue",
                    "mirante",
                ]),
            },
            party: CategoryRules {
                types: strings(&[
                    "night_club",
                    "bar",
                    "pub",
                    "karaoke",
                    "brewery",
                    "live_music",
                    "concert",
                    "festival",
                    "lounge",
                ]),
                keywords: strings(&[
                    "balada",
                    "party",
                    "festa",
                    " dj ",
                    "boate",
                    "club",
                    "open bar",
                    "happy hour",
                    "samba",
                    "pagode",
                    "funk",
                ]),
            },
            culture: CategoryRules {
                types: strings(&[
                    "museum",
                    "art_gallery",
                    "theater",
                    "performing_arts",
                    "cultural_center",
                    "historical_landmark",
                    "concert_hall",
                    "exhibition",
                    "arts",
                ]),
                keywords: strings(&[
                    "museu",
                    "museum",
                    "exposição",
                    "exhibition",
                    "teatro",
                    "theater",
                    "galeria",
                    "gallery",
                    "sarau",
                    "cultural",
                    "cinemateca",
                    "centro cultural",
                ]),
            },
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:5740".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_places_base_url() -> String {
    "https://maps.googleapis.com/maps/api".to_string()
}

fn default_events_base_url() -> String {
    "https://app.ticketmaster.com/discovery/v2".to_string()
}

fn default_requests_per_second() -> u32 {
    5
}

/// Default config file location (`~/.config/nearby/nearby-feed.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nearby").join("nearby-feed.toml"))
}

/// Default database location (`~/.local/share/nearby/nearby.db` on Linux)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("nearby"))
        .unwrap_or_else(|| PathBuf::from("./nearby_data"))
        .join("nearby.db")
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load config from `explicit`, `$NEARBY_CONFIG`, or the default location
///
/// Falls back to compiled defaults when no file is found or it fails to parse.
pub fn load_config(explicit: Option<&Path>) -> TomlConfig {
    let candidate = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .or_else(default_config_path);

    let Some(path) = candidate else {
        warn!("Could not determine config directory, using compiled defaults");
        return TomlConfig::default();
    };

    if !path.exists() {
        info!("No config file at {}, using compiled defaults", path.display());
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using compiled defaults", e);
            TomlConfig::default()
        }
    }
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolve a string setting: CLI → ENV → TOML
///
/// Blank values at any tier are ignored.
pub fn resolve_setting(
    name: &str,
    cli: Option<&str>,
    env_var: &str,
    toml_value: Option<&str>,
) -> Option<String> {
    let env_value = std::env::var(env_var).ok();
    let tiers = [
        ("command line", cli),
        ("environment", env_value.as_deref()),
        ("TOML", toml_value),
    ];

    let present: Vec<&str> = tiers
        .iter()
        .filter(|(_, v)| v.map(is_present).unwrap_or(false))
        .map(|(source, _)| *source)
        .collect();
    if present.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            present.join(", "),
            present[0]
        );
    }

    tiers
        .iter()
        .find_map(|(_, v)| v.filter(|v| is_present(v)).map(str::to_string))
}

/// Resolve the database path: CLI → ENV → TOML → compiled default
pub fn resolve_database_path(cli: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
        if is_present(&path) {
            return PathBuf::from(path);
        }
    }
    if let Some(path) = &toml.database_path {
        return path.clone();
    }
    default_database_path()
}

fn is_present(value: &str) -> bool {
    !value.trim().is_empty()
}
