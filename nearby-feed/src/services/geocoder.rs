//! Reverse geocoding with offline fallbacks
//!
//! Lookup order: places provider, then the built-in city table, then the
//! default region. Always yields a city.

use crate::models::CityState;
use crate::services::places_client::PlacesProvider;
use nearby_common::geo::{default_region, CityTable};
use nearby_common::Coordinates;
use std::sync::Arc;

/// Where a reverse-geocoded city came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitySource {
    Provider,
    CityTable,
    Default,
}

pub struct ReverseGeocoder {
    places: Arc<dyn PlacesProvider>,
    cities: &'static CityTable,
}

impl ReverseGeocoder {
    pub fn new(places: Arc<dyn PlacesProvider>, cities: &'static CityTable) -> Self {
        Self { places, cities }
    }

    /// City and state containing `point`
    pub async fn resolve_city(&self, point: Coordinates) -> (CityState, CitySource) {
        match self.places.reverse_geocode(point).await {
            Ok(Some(city)) => return (city, CitySource::Provider),
            Ok(None) => {
                tracing::debug!(lat = point.lat, lng = point.lng, "Provider found no city for point");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reverse geocoding failed, using city table");
            }
        }

        if let Some(bounds) = self.cities.city_at(&point) {
            return (
                CityState::new(bounds.city.clone(), bounds.state.clone()),
                CitySource::CityTable,
            );
        }

        let fallback = default_region();
        tracing::debug!(city = %fallback.city, "Point outside known cities, using default region");
        (
            CityState::new(fallback.city.clone(), fallback.state.clone()),
            CitySource::Default,
        )
    }
}
