//! Wider-radius fallback for sparse feeds

use crate::models::FeedItem;
use nearby_common::config::FeedSettings;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct CityExpansion {
    threshold: usize,
    radius_m: f64,
}

impl CityExpansion {
    pub fn new(threshold: usize, radius_m: f64) -> Self {
        Self { threshold, radius_m }
    }

    pub fn from_settings(settings: &FeedSettings) -> Self {
        Self::new(settings.expansion_threshold, settings.expansion_radius_m)
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// True when a filtered feed of `count` items is too thin
    pub fn should_expand(&self, count: usize) -> bool {
        count < self.threshold
    }

    /// Append items from the wider read that are not already present, then shuffle
    pub fn merge<R: Rng + ?Sized>(
        &self,
        mut current: Vec<FeedItem>,
        wider: Vec<FeedItem>,
        rng: &mut R,
    ) -> (Vec<FeedItem>, usize) {
        let mut seen: HashSet<String> = current.iter().map(|i| i.id.clone()).collect();
        let before = current.len();
        for item in wider {
            if seen.insert(item.id.clone()) {
                current.push(item);
            }
        }
        let added = current.len() - before;
        current.shuffle(rng);
        (current, added)
    }
}
