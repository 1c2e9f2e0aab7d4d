//! Per-user accepted/rejected decisions

use async_trait::async_trait;
use nearby_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;

/// What the user did with an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Accepted,
    Rejected,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Accepted => "accepted",
            InteractionKind::Rejected => "rejected",
        }
    }
}

/// Read side of the interaction store
///
/// Each returned reference is either a canonical venue id or an external
/// place id; callers must match against both.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn accepted_refs(&self, user_id: &str) -> Result<HashSet<String>>;
    async fn rejected_refs(&self, user_id: &str) -> Result<HashSet<String>>;
}

/// `InteractionStore` over the SQLite `user_interactions` table
#[derive(Clone)]
pub struct SqliteInteractionStore {
    pool: SqlitePool,
}

impl SqliteInteractionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a decision (idempotent)
    pub async fn record(&self, user_id: &str, item_ref: &str, kind: InteractionKind) -> Result<()> {
        if user_id.trim().is_empty() || item_ref.trim().is_empty() {
            return Err(Error::InvalidInput("user_id and item_ref are required".to_string()));
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_interactions (user_id, item_ref, kind, created_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(user_id)
        .bind(item_ref)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn refs(&self, user_id: &str, kind: InteractionKind) -> Result<HashSet<String>> {
        let refs: Vec<String> = sqlx::query_scalar(
            "SELECT item_ref FROM user_interactions WHERE user_id = ? AND kind = ?",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(refs.into_iter().collect())
    }
}

#[async_trait]
impl InteractionStore for SqliteInteractionStore {
    async fn accepted_refs(&self, user_id: &str) -> Result<HashSet<String>> {
        self.refs(user_id, InteractionKind::Accepted).await
    }

    async fn rejected_refs(&self, user_id: &str) -> Result<HashSet<String>> {
        self.refs(user_id, InteractionKind::Rejected).await
    }
}
