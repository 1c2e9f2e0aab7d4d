//! Geographic primitives shared by the feed engine and the geocoding fallback
//!
//! Holds the single city bounding-box table. Both the event city-substitution
//! path and reverse geocoding read from it, so there is exactly one copy to
//! maintain.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Metres per degree of latitude (flat approximation used for bounding boxes)
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A WGS84 point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Finite and inside the lat/lng ranges
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Exactly (0,0), the placeholder used for rows with no geocode
    pub fn is_origin(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }

    /// Great-circle distance in kilometres
    pub fn distance_km(&self, other: &Coordinates) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }
}

/// Great-circle distance between two points in kilometres
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Rectangular lat/lng region approximating a circular search radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Box around `center` whose half-sides are `radius_m`
    ///
    /// The longitude delta is widened by `1 / cos(lat)` since meridians
    /// converge towards the poles.
    pub fn around(center: Coordinates, radius_m: f64) -> Self {
        let lat_delta = radius_m / METERS_PER_DEGREE;
        let lng_delta = radius_m / (METERS_PER_DEGREE * center.lat.to_radians().cos());
        Self {
            min_lat: center.lat - lat_delta,
            max_lat: center.lat + lat_delta,
            min_lng: center.lng - lng_delta,
            max_lng: center.lng + lng_delta,
        }
    }

    pub fn contains(&self, point: &Coordinates) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

/// A city and the box that approximately covers it
#[derive(Debug, Clone, PartialEq)]
pub struct CityBounds {
    pub city: String,
    pub state: String,
    pub bounds: BoundingBox,
    pub center: Coordinates,
}

impl CityBounds {
    fn new(city: &str, state: &str, lat: (f64, f64), lng: (f64, f64), center: (f64, f64)) -> Self {
        Self {
            city: city.to_string(),
            state: state.to_string(),
            bounds: BoundingBox {
                min_lat: lat.0,
                max_lat: lat.1,
                min_lng: lng.0,
                max_lng: lng.1,
            },
            center: Coordinates::new(center.0, center.1),
        }
    }

    /// Same city, ignoring case and accents; state compared only when both sides have one
    pub fn matches(&self, city: &str, state: Option<&str>) -> bool {
        if fold(&self.city) != fold(city) {
            return false;
        }
        match state {
            Some(state) if !state.trim().is_empty() => fold(&self.state) == fold(state),
            _ => true,
        }
    }
}

/// Lookup table of known city boxes
#[derive(Debug, Clone)]
pub struct CityTable {
    cities: Vec<CityBounds>,
}

static BUILTIN_CITIES: Lazy<CityTable> = Lazy::new(|| CityTable {
    cities: vec![
        CityBounds::new("São Paulo", "SP", (-24.01, -23.35), (-46.83, -46.36), (-23.5505, -46.6333)),
        CityBounds::new("Rio de Janeiro", "RJ", (-23.08, -22.75), (-43.80, -43.10), (-22.9068, -43.1729)),
        CityBounds::new("Belo Horizonte", "MG", (-20.06, -19.78), (-44.07, -43.86), (-19.9167, -43.9345)),
        CityBounds::new("Curitiba", "PR", (-25.65, -25.34), (-49.39, -49.18), (-25.4284, -49.2733)),
        CityBounds::new("Porto Alegre", "RS", (-30.27, -29.93), (-51.31, -51.01), (-30.0346, -51.2177)),
        CityBounds::new("Brasília", "DF", (-16.05, -15.50), (-48.29, -47.31), (-15.7939, -47.8828)),
        CityBounds::new("Salvador", "BA", (-13.02, -12.73), (-38.53, -38.30), (-12.9777, -38.5016)),
        CityBounds::new("Recife", "PE", (-8.16, -7.93), (-35.02, -34.86), (-8.0476, -34.8770)),
        CityBounds::new("Fortaleza", "CE", (-3.90, -3.69), (-38.64, -38.40), (-3.7319, -38.5267)),
        CityBounds::new("Florianópolis", "SC", (-27.85, -27.38), (-48.62, -48.35), (-27.5954, -48.5480)),
        CityBounds::new("Campinas", "SP", (-23.05, -22.75), (-47.20, -46.95), (-22.9099, -47.0626)),
    ],
});

impl CityTable {
    /// Built-in table of major Brazilian cities
    pub fn builtin() -> &'static CityTable {
        &BUILTIN_CITIES
    }

    /// City whose box contains `point`, if any
    pub fn city_at(&self, point: &Coordinates) -> Option<&CityBounds> {
        self.cities.iter().find(|c| c.bounds.contains(point))
    }

    /// Look a city up by name (and state, when given)
    pub fn find(&self, city: &str, state: Option<&str>) -> Option<&CityBounds> {
        self.cities.iter().find(|c| c.matches(city, state))
    }

    /// True when `point` lies inside the named city's box
    pub fn point_in_city(&self, point: &Coordinates, city: &str, state: Option<&str>) -> bool {
        self.find(city, state)
            .map(|c| c.bounds.contains(point))
            .unwrap_or(false)
    }
}

/// Region used when nothing better is known
pub fn default_region() -> &'static CityBounds {
    // First builtin entry is São Paulo
    &BUILTIN_CITIES.cities[0]
}

/// Lowercase and strip the Portuguese diacritics so "São Paulo" == "sao paulo"
pub fn fold(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'Á' | 'À' | 'Â' | 'Ã' => 'a',
            'é' | 'ê' | 'É' | 'Ê' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'ô' | 'õ' | 'Ó' | 'Ô' | 'Õ' => 'o',
            'ú' | 'ü' | 'Ú' | 'Ü' => 'u',
            'ç' | 'Ç' => 'c',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
