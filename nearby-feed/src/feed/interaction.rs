//! Removes items the user already accepted or rejected

use crate::db::InteractionStore;
use crate::models::FeedItem;
use std::collections::HashSet;
use std::sync::Arc;

pub struct InteractionFilter {
    store: Arc<dyn InteractionStore>,
}

impl InteractionFilter {
    pub fn new(store: Arc<dyn InteractionStore>) -> Self {
        Self { store }
    }

    /// Filter `items` for `user_id`; a store fault leaves the list untouched
    pub async fn apply(&self, items: Vec<FeedItem>, user_id: Option<&str>) -> Vec<FeedItem> {
        let Some(user_id) = user_id else {
            return items;
        };
        if items.is_empty() {
            return items;
        }

        let (accepted, rejected) = tokio::join!(
            self.store.accepted_refs(user_id),
            self.store.rejected_refs(user_id)
        );

        match (accepted, rejected) {
            (Ok(accepted), Ok(rejected)) => {
                let before = items.len();
                let kept = exclude_seen(items, &accepted, &rejected);
                tracing::debug!(user_id, removed = before - kept.len(), "Applied interaction filter");
                kept
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(user_id, error = %e, "Interaction store read failed, skipping filter");
                items
            }
        }
    }
}

/// Drop items referenced (by id or place id) in either set
pub fn exclude_seen(
    items: Vec<FeedItem>,
    accepted: &HashSet<String>,
    rejected: &HashSet<String>,
) -> Vec<FeedItem> {
    items
        .into_iter()
        .filter(|item| !item.is_referenced_in(accepted) && !item.is_referenced_in(rejected))
        .collect()
}
