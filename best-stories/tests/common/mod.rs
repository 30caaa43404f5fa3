#![allow(dead_code)]

// Re-export commonly used test types and utilities
pub use best_stories::{
    sample_story, BestStoriesService, CacheStats, CacheWorker, MockStorySource, StoriesCache,
    StoriesError, StoryDetail, StoryId, StorySource,
};

use std::sync::{Arc, Once};
use std::time::Duration;

/// Upper bound for anything a test waits on
pub const WAIT: Duration = Duration::from_secs(5);

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Mock source preloaded with `(id, score)` stories
pub fn mock_with_stories(stories: &[(StoryId, i64)]) -> Arc<MockStorySource> {
    let source = MockStorySource::new();
    for &(id, score) in stories {
        source.insert_story(id, sample_story(id, score));
    }
    Arc::new(source)
}

/// Poll cache stats until `condition` holds. Panics after `WAIT`.
pub async fn wait_for_stats(cache: &StoriesCache, condition: impl Fn(&CacheStats) -> bool) -> CacheStats {
    let polling = async {
        loop {
            let stats = cache.stats().await.expect("cache stopped");
            if condition(&stats) {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(WAIT, polling)
        .await
        .expect("cache never reached the expected state")
}

pub fn scores(stories: &[StoryDetail]) -> Vec<i64> {
    stories.iter().map(|s| s.score).collect()
}
