//! Query-point resolution
//!
//! Falls back from request coordinates to the user's saved location and
//! finally to the default region. Never fails.

use crate::db::ProfileStore;
use crate::models::StoredLocation;
use crate::services::PlacesProvider;
use nearby_common::geo::{default_region, CityTable};
use nearby_common::Coordinates;
use serde::Serialize;
use std::sync::Arc;

/// Where the query point came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    Request,
    Profile,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub coordinates: Coordinates,
    pub source: LocationSource,
}

/// Resolution result plus the notice to show the user, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub location: ResolvedLocation,
    pub notice: Option<String>,
}

fn usable(point: Coordinates) -> bool {
    point.is_valid() && !point.is_origin()
}

pub struct CoordinateResolver {
    profiles: Arc<dyn ProfileStore>,
    places: Arc<dyn PlacesProvider>,
    cities: &'static CityTable,
}

impl CoordinateResolver {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        places: Arc<dyn PlacesProvider>,
        cities: &'static CityTable,
    ) -> Self {
        Self {
            profiles,
            places,
            cities,
        }
    }

    pub async fn resolve(&self, requested: Option<Coordinates>, user_id: Option<&str>) -> Resolution {
        if let Some(point) = requested.filter(|p| usable(*p)) {
            return Resolution {
                location: ResolvedLocation {
                    coordinates: point,
                    source: LocationSource::Request,
                },
                notice: None,
            };
        }

        if let Some(user_id) = user_id {
            if let Some(point) = self.from_profile(user_id).await {
                tracing::debug!(user_id, lat = point.lat, lng = point.lng, "Using profile location");
                return Resolution {
                    location: ResolvedLocation {
                        coordinates: point,
                        source: LocationSource::Profile,
                    },
                    notice: Some("Showing places near your saved location".to_string()),
                };
            }
        }

        let region = default_region();
        tracing::debug!(city = %region.city, "No usable location, using default region");
        Resolution {
            location: ResolvedLocation {
                coordinates: region.center,
                source: LocationSource::Default,
            },
            notice: Some(format!(
                "Location unavailable, showing places in {}",
                region.city
            )),
        }
    }

    async fn from_profile(&self, user_id: &str) -> Option<Coordinates> {
        let stored = match self.profiles.stored_location(user_id).await {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Profile location read failed");
                return None;
            }
        };

        if let StoredLocation::Structured {
            coordinates: Some(point),
            ..
        } = &stored
        {
            if usable(*point) {
                return Some(*point);
            }
        }

        if let Some(query) = stored.query_text() {
            match self.places.geocode(&query).await {
                Ok(Some(point)) if usable(point) => return Some(point),
                Ok(_) => tracing::debug!(query = %query, "Geocoder found nothing for profile location"),
                Err(e) => tracing::warn!(query = %query, error = %e, "Geocoding profile location failed"),
            }
        }

        self.from_city_table(&stored)
    }

    /// Center of a known city named by the stored location
    fn from_city_table(&self, stored: &StoredLocation) -> Option<Coordinates> {
        match stored {
            StoredLocation::Structured {
                city: Some(city),
                state,
                ..
            } => self.cities.find(city, state.as_deref()).map(|c| c.center),
            StoredLocation::Text(text) => text
                .split(',')
                .find_map(|part| self.cities.find(part, None))
                .map(|c| c.center),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CityState, RawPlace, UserPreferences, VibeCategory};
    use crate::services::{DisabledPlaces, PlacesError};
    use async_trait::async_trait;

    struct GeocoderDown;

    #[async_trait]
    impl PlacesProvider for GeocoderDown {
        async fn search(
            &self,
            _center: Coordinates,
            _radius_m: f64,
            _vibe: Option<VibeCategory>,
        ) -> Result<Vec<RawPlace>, PlacesError> {
            Ok(Vec::new())
        }

        async fn geocode(&self, _query: &str) -> Result<Option<Coordinates>, PlacesError> {
            Err(PlacesError::Status("OVER_QUERY_LIMIT".to_string()))
        }

        async fn reverse_geocode(&self, _point: Coordinates) -> Result<Option<CityState>, PlacesError> {
            Ok(None)
        }
    }

    struct FixedProfile(Option<StoredLocation>);

    #[async_trait]
    impl ProfileStore for FixedProfile {
        async fn preferences(&self, _user_id: &str) -> nearby_common::Result<Option<UserPreferences>> {
            Ok(None)
        }

        async fn stored_location(&self, _user_id: &str) -> nearby_common::Result<Option<StoredLocation>> {
            Ok(self.0.clone())
        }
    }

    fn resolver(stored: Option<StoredLocation>) -> CoordinateResolver {
        CoordinateResolver::new(
            Arc::new(FixedProfile(stored)),
            Arc::new(DisabledPlaces),
            CityTable::builtin(),
        )
    }

    #[tokio::test]
    async fn test_request_coordinates_win() {
        let point = Coordinates::new(-22.9068, -43.1729);
        let resolution = resolver(None).resolve(Some(point), Some("u1")).await;
        assert_eq!(resolution.location.coordinates, point);
        assert_eq!(resolution.location.source, LocationSource::Request);
        assert!(resolution.notice.is_none());
    }

    #[tokio::test]
    async fn test_origin_falls_back_to_structured_profile() {
        let saved = Coordinates::new(-25.43, -49.27);
        let stored = StoredLocation::Structured {
            address: None,
            city: None,
            state: None,
            coordinates: Some(saved),
        };
        let resolution = resolver(Some(stored))
            .resolve(Some(Coordinates::new(0.0, 0.0)), Some("u1"))
            .await;
        assert_eq!(resolution.location.coordinates, saved);
        assert_eq!(resolution.location.source, LocationSource::Profile);
        assert!(resolution.notice.is_some());
    }

    #[tokio::test]
    async fn test_text_location_resolves_via_city_table() {
        let stored = StoredLocation::Text("Centro, Curitiba".to_string());
        let resolution = resolver(Some(stored)).resolve(None, Some("u1")).await;
        assert_eq!(resolution.location.source, LocationSource::Profile);
        assert_eq!(resolution.location.coordinates, Coordinates::new(-25.4284, -49.2733));
    }

    #[tokio::test]
    async fn test_invalid_input_without_user_uses_default() {
        let resolution = resolver(None)
            .resolve(Some(Coordinates::new(f64::NAN, 200.0)), None)
            .await;
        assert_eq!(resolution.location.source, LocationSource::Default);
        assert_eq!(resolution.location.coordinates, Coordinates::new(-23.5505, -46.6333));
        assert!(resolution.notice.unwrap().contains("São Paulo"));
    }

    #[tokio::test]
    async fn test_geocode_failure_falls_back_to_city_table() {
        let stored = StoredLocation::Structured {
            address: Some("Rua XV de Novembro, 100".to_string()),
            city: Some("Curitiba".to_string()),
            state: Some("PR".to_string()),
            coordinates: None,
        };
        let resolver = CoordinateResolver::new(
            Arc::new(FixedProfile(Some(stored))),
            Arc::new(GeocoderDown),
            CityTable::builtin(),
        );

        let resolution = resolver.resolve(None, Some("u1")).await;

        assert_eq!(resolution.location.source, LocationSource::Profile);
        assert_eq!(resolution.location.coordinates, Coordinates::new(-25.4284, -49.2733));
    }

    #[tokio::test]
    async fn test_geocode_failure_with_unknown_city_uses_default() {
        let stored = StoredLocation::Text("Vila Inexistente".to_string());
        let resolver = CoordinateResolver::new(
            Arc::new(FixedProfile(Some(stored))),
            Arc::new(GeocoderDown),
            CityTable::builtin(),
        );

        let resolution = resolver.resolve(None, Some("u1")).await;

        assert_eq!(resolution.location.source, LocationSource::Default);
        assert_eq!(resolution.location.coordinates, Coordinates::new(-23.5505, -46.6333));
    }
}
