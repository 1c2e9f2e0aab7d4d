//! Vibe category filter
//!
//! Restricts a feed to date / party / culture venues using per-category type
//! allow-lists and keywords. If nothing would survive, the unfiltered list is
//! returned instead and the relaxation is reported to the caller.

use crate::models::{FeedItem, VibeCategory};
use nearby_common::config::{CategoryRules, VibeRules};

/// Lowercased copy of one category's rules
#[derive(Debug, Clone)]
struct CategoryMatcher {
    types: Vec<String>,
    keywords: Vec<String>,
}

impl CategoryMatcher {
    fn new(rules: &CategoryRules) -> Self {
        Self {
            types: lowercase_all(&rules.types),
            keywords: lowercase_all(&rules.keywords),
        }
    }

    fn matches(&self, item: &FeedItem, padded_text: &str) -> bool {
        let type_match = item.type_tags().iter().any(|tag| {
            self.types
                .iter()
                .any(|allowed| tag.contains(allowed.as_str()) || allowed.contains(tag.as_str()))
        });
        type_match || self.keywords.iter().any(|k| padded_text.contains(k.as_str()))
    }
}

fn lowercase_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.to_lowercase())
        .filter(|v| !v.trim().is_empty())
        .collect()
}

/// Result of a vibe pass
#[derive(Debug, Clone, PartialEq)]
pub struct VibeOutcome {
    pub items: Vec<FeedItem>,
    /// True when the safety valve returned the unfiltered input
    pub relaxed: bool,
}

#[derive(Debug, Clone)]
pub struct VibeFilter {
    blocked: Vec<String>,
    date: CategoryMatcher,
    party: CategoryMatcher,
    culture: CategoryMatcher,
}

impl VibeFilter {
    pub fn from_rules(rules: &VibeRules) -> Self {
        Self {
            blocked: lowercase_all(&rules.blocked_keywords),
            date: CategoryMatcher::new(&rules.date),
            party: CategoryMatcher::new(&rules.party),
            culture: CategoryMatcher::new(&rules.culture),
        }
    }

    fn matcher(&self, vibe: VibeCategory) -> &CategoryMatcher {
        match vibe {
            VibeCategory::Date => &self.date,
            VibeCategory::Party => &self.party,
            VibeCategory::Culture => &self.culture,
        }
    }

    /// Whether a single item belongs to `vibe`
    pub fn admits(&self, item: &FeedItem, vibe: VibeCategory) -> bool {
        // Padding lets keywords like " dj " match at either end
        let text = format!(" {} ", item.text());
        if self.blocked.iter().any(|k| text.contains(k.as_str())) {
            return false;
        }
        self.matcher(vibe).matches(item, &text)
    }

    pub fn apply(&self, items: Vec<FeedItem>, vibe: Option<VibeCategory>) -> VibeOutcome {
        let Some(vibe) = vibe else {
            return VibeOutcome {
                items,
                relaxed: false,
            };
        };
        if items.is_empty() {
            return VibeOutcome {
                items,
                relaxed: false,
            };
        }

        let kept: Vec<FeedItem> = items
            .iter()
            .filter(|item| self.admits(item, vibe))
            .cloned()
            .collect();

        if kept.is_empty() {
            tracing::warn!(
                vibe = %vibe,
                candidates = items.len(),
                "No item matched vibe, returning unfiltered list"
            );
            return VibeOutcome {
                items,
                relaxed: true,
            };
        }

        tracing::debug!(vibe = %vibe, before = items.len(), after = kept.len(), "Applied vibe filter");
        VibeOutcome {
            items: kept,
            relaxed: false,
        }
    }
}
