//! Preference scoring and final ordering

use crate::models::{FeedItem, UserPreferences};
use rand::seq::SliceRandom;
use rand::Rng;

const BASE_SCORE: f64 = 10.0;
const TYPE_MATCH_BONUS: f64 = 20.0;
const VIBE_MATCH_BONUS: f64 = 15.0;
const MUSIC_MATCH_BONUS: f64 = 10.0;
const DISTANCE_PENALTY_PER_KM: f64 = 0.5;

fn normalized(tags: &[String]) -> impl Iterator<Item = String> + '_ {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PreferenceScorer;

impl PreferenceScorer {
    pub fn new() -> Self {
        Self
    }

    /// Weighted match of one item against the user's preferences
    pub fn score(&self, item: &FeedItem, prefs: &UserPreferences) -> f64 {
        let mut score = BASE_SCORE;
        let tags = item.type_tags();
        let text = item.text();

        let type_match = normalized(&prefs.drinks)
            .chain(normalized(&prefs.foods))
            .chain(normalized(&prefs.music))
            .any(|pref| {
                tags.iter()
                    .any(|tag| tag.contains(pref.as_str()) || pref.contains(tag.as_str()))
            });
        if type_match {
            score += TYPE_MATCH_BONUS;
        }

        if normalized(&prefs.vibes).any(|v| text.contains(v.as_str())) {
            score += VIBE_MATCH_BONUS;
        }

        let music_hits = normalized(&prefs.music)
            .filter(|m| text.contains(m.as_str()))
            .count();
        score += MUSIC_MATCH_BONUS * music_hits as f64;

        score - DISTANCE_PENALTY_PER_KM * item.distance_km
    }

    /// Order items for the user
    ///
    /// With usable preferences, items are scored and sorted best first (closer
    /// first on ties). Without, the list is shuffled and left unscored.
    pub fn rank(&self, items: Vec<FeedItem>, prefs: Option<&UserPreferences>) -> Vec<FeedItem> {
        self.rank_with_rng(items, prefs, &mut rand::thread_rng())
    }

    pub fn rank_with_rng<R: Rng + ?Sized>(
        &self,
        mut items: Vec<FeedItem>,
        prefs: Option<&UserPreferences>,
        rng: &mut R,
    ) -> Vec<FeedItem> {
        let Some(prefs) = prefs.filter(|p| !p.is_empty()) else {
            items.shuffle(rng);
            return items;
        };

        for item in items.iter_mut() {
            item.match_score = Some(self.score(item, prefs));
        }

        items.sort_by(|a, b| {
            let sa = a.match_score.unwrap_or(f64::MIN);
            let sb = b.match_score.unwrap_or(f64::MIN);
            sb.total_cmp(&sa)
                .then_with(|| a.distance_km.total_cmp(&b.distance_km))
        });
        items
    }
}
