//! Region signature: the key for population coalescing and TTL tracking

use crate::error::FeedError;
use crate::models::VibeCategory;
use nearby_common::Coordinates;
use std::fmt;

/// Decimal places kept from each coordinate (~11 m)
const COORDINATE_SCALE: f64 = 10_000.0;

/// Deterministic key over `(lat, lng, radius, user, vibe)`
///
/// Coordinates are stored as fixed-point integers so that float noise below
/// the fourth decimal does not split one region into several keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionSignature {
    lat_e4: i64,
    lng_e4: i64,
    radius_m: u64,
    user_id: Option<String>,
    vibe: Option<VibeCategory>,
}

impl RegionSignature {
    pub fn new(
        center: Coordinates,
        radius_m: f64,
        user_id: Option<&str>,
        vibe: Option<VibeCategory>,
    ) -> Result<Self, FeedError> {
        if !center.is_valid() {
            return Err(FeedError::InvalidSignature(format!(
                "coordinates out of range: ({}, {})",
                center.lat, center.lng
            )));
        }
        if !radius_m.is_finite() || radius_m <= 0.0 {
            return Err(FeedError::InvalidSignature(format!(
                "radius must be positive, got {}",
                radius_m
            )));
        }

        Ok(Self {
            lat_e4: (center.lat * COORDINATE_SCALE).round() as i64,
            lng_e4: (center.lng * COORDINATE_SCALE).round() as i64,
            radius_m: radius_m.round().max(1.0) as u64,
            user_id: user_id.map(str::to_string),
            vibe,
        })
    }
}

impl fmt::Display for RegionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4},{:.4}:{}m:{}:{}",
            self.lat_e4 as f64 / COORDINATE_SCALE,
            self.lng_e4 as f64 / COORDINATE_SCALE,
            self.radius_m,
            self.user_id.as_deref().unwrap_or("anonymous"),
            self.vibe.map(|v| v.as_str()).unwrap_or("any"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_noise_shares_a_signature() {
        let a = RegionSignature::new(Coordinates::new(-23.55050001, -46.6333), 5000.0, None, None).unwrap();
        let b = RegionSignature::new(Coordinates::new(-23.55049999, -46.6333), 5000.0, None, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_user_and_vibe_split_signatures() {
        let center = Coordinates::new(-23.5505, -46.6333);
        let anon = RegionSignature::new(center, 5000.0, None, None).unwrap();
        let user = RegionSignature::new(center, 5000.0, Some("u1"), None).unwrap();
        let party = RegionSignature::new(center, 5000.0, Some("u1"), Some(VibeCategory::Party)).unwrap();
        assert_ne!(anon, user);
        assert_ne!(user, party);
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let center = Coordinates::new(-23.5505, -46.6333);
        assert!(RegionSignature::new(center, 0.0, None, None).is_err());
        assert!(RegionSignature::new(center, f64::NAN, None, None).is_err());
        assert!(RegionSignature::new(Coordinates::new(f64::INFINITY, 0.0), 100.0, None, None).is_err());
        assert!(RegionSignature::new(Coordinates::new(95.0, 0.0), 100.0, None, None).is_err());
    }

    #[test]
    fn test_display_is_readable() {
        let sig = RegionSignature::new(
            Coordinates::new(-23.5505, -46.6333),
            5000.0,
            Some("u1"),
            Some(VibeCategory::Date),
        )
        .unwrap();
        assert_eq!(sig.to_string(), "-23.5505,-46.6333:5000m:u1:date");
    }
}
