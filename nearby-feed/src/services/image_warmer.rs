//! Image caching hook
//!
//! Photo caching lives outside this service. After a population pass creates
//! new venues, their ids are handed to an `ImageWarmer` without waiting on it.
//! Place rows carry an unsigned `photo_reference`; the warmer signs it with
//! the provider key and fills `image_url` once the photo is cached.

use async_trait::async_trait;

#[async_trait]
pub trait ImageWarmer: Send + Sync {
    /// Best-effort warm-up for freshly created venues; must not fail the caller
    async fn warm(&self, venue_ids: Vec<String>);
}

/// Default hook: records the hand-off and does nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingImageWarmer;

#[async_trait]
impl ImageWarmer for LoggingImageWarmer {
    async fn warm(&self, venue_ids: Vec<String>) {
        tracing::debug!(count = venue_ids.len(), "Image warm-up requested for new venues");
    }
}
