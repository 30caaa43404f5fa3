use crate::stories_cache::StoriesCache;
use crate::traits::StorySource;
use crate::types::{Result, StoriesError, StoryDetail};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Answers "the `count` best stories right now".
///
/// Every call re-reads the candidate list from the remote API; the details
/// come from the shared cache.
#[derive(Clone)]
pub struct BestStoriesService {
    source: Arc<dyn StorySource>,
    cache: StoriesCache,
    request_timeout: Duration,
}

impl BestStoriesService {
    pub fn new(source: Arc<dyn StorySource>, cache: StoriesCache, request_timeout: Duration) -> Self {
        Self {
            source,
            cache,
            request_timeout,
        }
    }

    pub async fn get_best_stories(&self, count: i64) -> Result<Vec<StoryDetail>> {
        if count <= 0 {
            return Ok(Vec::new());
        }

        // we allow each request to hit the remote API for the latest best stories
        let ids = match self.source.best_story_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to fetch best story ids: {}", e);
                return Ok(Vec::new());
            }
        };
        if ids.is_empty() {
            warn!("No best stories found");
            return Ok(Vec::new());
        }

        debug!("Requesting {} of {} best stories from cache", count, ids.len());
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        tokio::time::timeout(self.request_timeout, self.cache.get_best_stories(ids, count))
            .await
            .map_err(|_| StoriesError::Timeout)?
    }
}
