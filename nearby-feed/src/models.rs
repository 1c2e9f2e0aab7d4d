//! Data model for feed assembly
//!
//! `FeedItem` is what the engine ranks and returns. `NewVenue` is what the
//! population tasks write back into the regional store.

use chrono::{DateTime, Utc};
use nearby_common::Coordinates;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// A venue or event candidate returned by the discovery engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    /// External places-provider id, when the row came from places search
    pub place_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    /// Raw provider type tags (e.g. `night_club`, `point_of_interest`)
    pub provider_types: Vec<String>,
    pub coordinates: Coordinates,
    pub rating: Option<f64>,
    pub price_level: Option<i64>,
    pub opening_hours: Option<serde_json::Value>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub ticket_url: Option<String>,
    /// Distance from the query point; never negative
    pub distance_km: f64,
    /// Mirrors `event_date.is_some()`
    pub is_event: bool,
    pub event_date: Option<DateTime<Utc>>,
    pub event_end: Option<DateTime<Utc>>,
    /// Set by preference scoring, absent when the feed was shuffled instead
    pub match_score: Option<f64>,
}

impl FeedItem {
    /// Minimal non-event item
    pub fn new(id: impl Into<String>, name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id: id.into(),
            place_id: None,
            name: name.into(),
            address: None,
            image_url: None,
            description: None,
            item_type: None,
            provider_types: Vec::new(),
            coordinates,
            rating: None,
            price_level: None,
            opening_hours: None,
            city: None,
            state: None,
            ticket_url: None,
            distance_km: 0.0,
            is_event: false,
            event_date: None,
            event_end: None,
            match_score: None,
        }
    }

    /// Turn the item into an event starting at `start`
    pub fn with_event_date(mut self, start: DateTime<Utc>) -> Self {
        self.event_date = Some(start);
        self.is_event = true;
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn with_distance(mut self, distance_km: f64) -> Self {
        self.distance_km = distance_km.max(0.0);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Lowercased name, description and type, space separated
    pub fn text(&self) -> String {
        let mut text = self.name.to_lowercase();
        for part in [self.description.as_deref(), self.item_type.as_deref()]
            .into_iter()
            .flatten()
        {
            text.push(' ');
            text.push_str(&part.to_lowercase());
        }
        text
    }

    /// Lowercased `item_type` followed by provider type tags
    pub fn type_tags(&self) -> Vec<String> {
        self.item_type
            .iter()
            .chain(self.provider_types.iter())
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// True if `refs` names this item by canonical or external id
    pub fn is_referenced_in(&self, refs: &HashSet<String>) -> bool {
        refs.contains(&self.id) || self.place_id.as_ref().is_some_and(|p| refs.contains(p))
    }
}

/// Coarse intent filter narrowing feed composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VibeCategory {
    Date,
    Party,
    Culture,
}

impl VibeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VibeCategory::Date => "date",
            VibeCategory::Party => "party",
            VibeCategory::Culture => "culture",
        }
    }
}

impl fmt::Display for VibeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VibeCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(VibeCategory::Date),
            "party" => Ok(VibeCategory::Party),
            "culture" => Ok(VibeCategory::Culture),
            other => Err(format!("unknown vibe category '{}'", other)),
        }
    }
}

/// Preference tags owned by the user-profile subsystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default)]
    pub drinks: Vec<String>,
    #[serde(default)]
    pub foods: Vec<String>,
    #[serde(default)]
    pub music: Vec<String>,
    /// Free-form ambience attributes ("rooftop", "cozy", ...)
    #[serde(default)]
    pub vibes: Vec<String>,
}

impl UserPreferences {
    pub fn is_empty(&self) -> bool {
        self.drinks.is_empty() && self.foods.is_empty() && self.music.is_empty() && self.vibes.is_empty()
    }
}

/// City and state (two-letter code) of a point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityState {
    pub city: String,
    pub state: String,
}

impl CityState {
    pub fn new(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            state: state.into(),
        }
    }
}

impl fmt::Display for CityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.city, self.state)
    }
}

/// Location saved on a user profile
#[derive(Debug, Clone, PartialEq)]
pub enum StoredLocation {
    /// Free text typed by the user ("Vila Madalena, São Paulo")
    Text(String),
    Structured {
        address: Option<String>,
        city: Option<String>,
        state: Option<String>,
        coordinates: Option<Coordinates>,
    },
}

impl StoredLocation {
    /// Text suitable for forward geocoding
    pub fn query_text(&self) -> Option<String> {
        match self {
            StoredLocation::Text(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
            StoredLocation::Structured {
                address, city, state, ..
            } => {
                if let Some(address) = address.as_deref().filter(|a| !a.trim().is_empty()) {
                    return Some(address.trim().to_string());
                }
                let parts: Vec<&str> = [city.as_deref(), state.as_deref()]
                    .into_iter()
                    .flatten()
                    .filter(|p| !p.trim().is_empty())
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(", "))
                }
            }
        }
    }
}

/// Place as returned by the places-search provider
#[derive(Debug, Clone, PartialEq)]
pub struct RawPlace {
    pub place_id: String,
    pub name: String,
    pub address: Option<String>,
    pub coordinates: Coordinates,
    pub rating: Option<f64>,
    pub price_level: Option<i64>,
    pub types: Vec<String>,
    /// Provider photo reference; must be signed with the API key before fetching
    pub photo_reference: Option<String>,
    pub opening_hours: Option<serde_json::Value>,
}

/// Generic tags every place carries; never useful as a primary type
const GENERIC_PLACE_TYPES: &[&str] = &["point_of_interest", "establishment"];

/// Row to be written into the regional store
#[derive(Debug, Clone, PartialEq)]
pub struct NewVenue {
    pub place_id: Option<String>,
    pub external_event_id: Option<String>,
    pub name: String,
    pub address: Option<String>,
    pub image_url: Option<String>,
    /// Unsigned places-provider photo reference, resolved by the image warmer
    pub photo_reference: Option<String>,
    pub venue_type: Option<String>,
    pub coordinates: Coordinates,
    pub event_start: Option<DateTime<Utc>>,
    pub event_end: Option<DateTime<Utc>>,
    pub ticket_url: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub price_level: Option<i64>,
    pub opening_hours: Option<serde_json::Value>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub provider_metadata: serde_json::Value,
}

impl NewVenue {
    pub fn from_place(place: &RawPlace) -> Self {
        let venue_type = place
            .types
            .iter()
            .find(|t| !GENERIC_PLACE_TYPES.contains(&t.as_str()))
            .cloned();

        Self {
            place_id: Some(place.place_id.clone()),
            external_event_id: None,
            name: place.name.clone(),
            address: place.address.clone(),
            image_url: None,
            photo_reference: place.photo_reference.clone(),
            venue_type,
            coordinates: place.coordinates,
            event_start: None,
            event_end: None,
            ticket_url: None,
            description: None,
            rating: place.rating,
            price_level: place.price_level,
            opening_hours: place.opening_hours.clone(),
            city: None,
            state: None,
            provider_metadata: serde_json::json!({
                "source": "places",
                "types": place.types,
            }),
        }
    }
}
