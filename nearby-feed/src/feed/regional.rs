//! Bounding-box read against the regional store
//!
//! One pass turns store rows into feed items: distance from the query point,
//! city substitution for events without coordinates, quality and distance
//! filtering, then ordering (events first, nearest first).

use crate::db::{RegionalStore, VenueRow};
use crate::feed::quality::QualityFilter;
use crate::models::FeedItem;
use nearby_common::config::FeedSettings;
use nearby_common::geo::{BoundingBox, CityTable};
use nearby_common::Coordinates;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

pub struct RegionalQuery {
    store: Arc<dyn RegionalStore>,
    quality: Arc<QualityFilter>,
    cities: &'static CityTable,
    settings: FeedSettings,
}

impl RegionalQuery {
    pub fn new(
        store: Arc<dyn RegionalStore>,
        quality: Arc<QualityFilter>,
        cities: &'static CityTable,
        settings: FeedSettings,
    ) -> Self {
        Self {
            store,
            quality,
            cities,
            settings,
        }
    }

    /// Items around `center` within `radius_m`; store faults yield an empty list
    pub async fn fetch(&self, center: Coordinates, radius_m: f64) -> Vec<FeedItem> {
        let bbox = BoundingBox::around(center, radius_m);

        let mut rows = match self.store.fetch_in_box(&bbox, self.settings.page_size).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, lat = center.lat, lng = center.lng, "Regional store read failed");
                return Vec::new();
            }
        };

        if let Some(city) = self.cities.city_at(&center) {
            match self
                .store
                .fetch_unlocated_events(&city.city, &city.state, self.settings.page_size)
                .await
            {
                Ok(extra) => {
                    let seen: HashSet<String> = rows.iter().map(|r| r.id.clone()).collect();
                    rows.extend(extra.into_iter().filter(|r| !seen.contains(&r.id)));
                }
                Err(e) => {
                    tracing::warn!(error = %e, city = %city.city, "City event read failed");
                }
            }
        }

        let fetched = rows.len();
        let items = filter_and_rank(rows, center, radius_m, &self.quality, self.cities, &self.settings);
        tracing::debug!(fetched, kept = items.len(), radius_m, "Regional query complete");
        items
    }
}

/// Whether an event row is anchored at (0,0) in the city containing `center`
fn in_query_city(row: &VenueRow, center: &Coordinates, cities: &CityTable) -> bool {
    if !row.is_event() || !row.coordinates().is_origin() {
        return false;
    }
    match row.city.as_deref() {
        Some(city) => cities.point_in_city(center, city, row.state.as_deref()),
        None => false,
    }
}

/// Distance, quality and ordering pass over raw rows
pub fn filter_and_rank(
    rows: Vec<VenueRow>,
    center: Coordinates,
    radius_m: f64,
    quality: &QualityFilter,
    cities: &CityTable,
    settings: &FeedSettings,
) -> Vec<FeedItem> {
    let max_venue_km = radius_m / 1000.0 * settings.radius_buffer;

    let mut items: Vec<FeedItem> = rows
        .into_iter()
        .filter(|row| row.is_active)
        .filter_map(|row| {
            let city_anchored = in_query_city(&row, &center, cities);
            let distance_km = if city_anchored {
                settings.city_event_distance_km
            } else {
                center.distance_km(&row.coordinates())
            };

            let keep = if row.is_event() {
                city_anchored || distance_km <= settings.event_max_distance_km
            } else {
                distance_km <= max_venue_km
            };
            if !keep {
                return None;
            }

            let item = row.into_feed_item(distance_km);
            quality.passes(&item).then_some(item)
        })
        .collect();

    items.sort_by(|a, b| match (a.is_event, b.is_event) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.distance_km.total_cmp(&b.distance_km),
    });
    items
}
