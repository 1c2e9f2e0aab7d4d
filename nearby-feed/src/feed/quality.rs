//! Quality filter for non-event venues

use crate::error::FeedError;
use crate::models::{FeedItem, RawPlace};
use nearby_common::config::FilterRules;
use regex::{RegexSet, RegexSetBuilder};

/// Drops low-rated venues and venues whose name marks them as unsuitable
#[derive(Debug, Clone)]
pub struct QualityFilter {
    min_rating: f64,
    blocked_names: RegexSet,
}

impl QualityFilter {
    pub fn from_rules(rules: &FilterRules) -> Result<Self, FeedError> {
        let blocked_names = RegexSetBuilder::new(&rules.blocked_name_patterns)
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            min_rating: rules.min_rating,
            blocked_names,
        })
    }

    pub fn is_blocked_name(&self, name: &str) -> bool {
        self.blocked_names.is_match(name)
    }

    fn rating_ok(&self, rating: Option<f64>) -> bool {
        rating.map_or(true, |r| r >= self.min_rating)
    }

    /// Events always pass; venues need an acceptable rating (or none) and name
    pub fn passes(&self, item: &FeedItem) -> bool {
        if item.is_event {
            return true;
        }
        self.rating_ok(item.rating) && !self.is_blocked_name(&item.name)
    }

    /// Whether a places-search result is worth persisting
    pub fn passes_place(&self, place: &RawPlace) -> bool {
        self.rating_ok(place.rating) && !self.is_blocked_name(&place.name)
    }
}
