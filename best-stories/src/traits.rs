use crate::types::{Result, StoryDetail, StoryId};
use async_trait::async_trait;

/// Trait for reading stories from the remote API
#[async_trait]
pub trait StorySource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Current ranked list of candidate ids. One remote call, no caching.
    async fn best_story_ids(&self) -> Result<Vec<StoryId>>;

    /// Full detail of a single story. One remote call, no retries.
    async fn fetch_story(&self, id: StoryId) -> Result<StoryDetail>;
}
