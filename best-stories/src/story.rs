use crate::stories_cache::Command;
use crate::traits::StorySource;
use crate::types::{LoadStatus, StoryDetail, StoryId};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, error, Instrument};

/// Written only by the story's own fetch task, read by the cache.
struct StoryState {
    status: AtomicU8,
    detail: OnceLock<StoryDetail>,
    cancelled: AtomicBool,
}

/// One tracked story and the single background fetch that loads it.
///
/// The fetch starts as soon as the story is created. Dropping the story
/// cancels the fetch; a fetch that has already got its answer may still
/// report back, which the cache tolerates.
pub struct Story {
    id: StoryId,
    state: Arc<StoryState>,
    task: JoinHandle<()>,
}

impl Story {
    pub(crate) fn spawn(
        id: StoryId,
        source: Arc<dyn StorySource>,
        events: WeakUnboundedSender<Command>,
    ) -> Self {
        let state = Arc::new(StoryState {
            status: AtomicU8::new(LoadStatus::NotLoaded as u8),
            detail: OnceLock::new(),
            cancelled: AtomicBool::new(false),
        });

        let task = tokio::spawn(
            load_story(id, source, state.clone(), events).instrument(debug_span!("story", id)),
        );

        Self { id, state, task }
    }

    pub fn id(&self) -> StoryId {
        self.id
    }

    pub fn status(&self) -> LoadStatus {
        LoadStatus::from_u8(self.state.status.load(Ordering::Acquire))
    }

    /// Present iff the story is `Loaded`.
    pub fn detail(&self) -> Option<&StoryDetail> {
        match self.status() {
            LoadStatus::Loaded => self.state.detail.get(),
            _ => None,
        }
    }
}

impl Drop for Story {
    fn drop(&mut self) {
        self.state.cancelled.store(true, Ordering::Release);
        self.task.abort();
        debug!("Story with id {} disposed", self.id);
    }
}

async fn load_story(
    id: StoryId,
    source: Arc<dyn StorySource>,
    state: Arc<StoryState>,
    events: WeakUnboundedSender<Command>,
) {
    state.status.store(LoadStatus::Loading as u8, Ordering::Release);
    debug!("Loading story with id {}", id);

    match source.fetch_story(id).await {
        Ok(detail) => {
            debug!("Story with id {} found: {}", id, detail.title);
            // detail first, then status: whoever sees Loaded also sees the detail
            let _ = state.detail.set(detail);
            state.status.store(LoadStatus::Loaded as u8, Ordering::Release);
        }
        Err(e) => {
            error!("Error loading story with id {}: {}", id, e);
            state.status.store(LoadStatus::Failed as u8, Ordering::Release);
        }
    }

    if state.cancelled.load(Ordering::Acquire) {
        return;
    }
    match events.upgrade() {
        Some(sender) => {
            if sender.send(Command::StoryFinished(id)).is_err() {
                debug!("Stories cache stopped before story {} finished", id);
            }
        }
        None => debug!("Stories cache dropped before story {} finished", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStorySource;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn next_finished(receiver: &mut mpsc::UnboundedReceiver<Command>) -> StoryId {
        let command = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("story never reported back")
            .expect("channel closed");
        match command {
            Command::StoryFinished(id) => id,
            _ => panic!("unexpected command from story"),
        }
    }

    #[tokio::test]
    async fn loads_detail_then_reports_finished() {
        let source = Arc::new(MockStorySource::new().with_story(7, 120));
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let story = Story::spawn(7, source.clone(), sender.downgrade());

        assert_eq!(next_finished(&mut receiver).await, 7);
        assert_eq!(story.status(), LoadStatus::Loaded);
        assert_eq!(story.detail().map(|d| d.score), Some(120));
        assert_eq!(source.fetch_calls(7), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_terminal_and_still_reports() {
        // id 8 is unknown to the mock, so the fetch fails with NotFound
        let source = Arc::new(MockStorySource::new());
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let story = Story::spawn(8, source, sender.downgrade());

        assert_eq!(next_finished(&mut receiver).await, 8);
        assert_eq!(story.status(), LoadStatus::Failed);
        assert!(story.status().is_finished());
        assert!(story.detail().is_none());
    }

    #[tokio::test]
    async fn dropping_story_cancels_fetch_without_reporting() {
        let source = Arc::new(MockStorySource::new().with_story(9, 1));
        source.hold(9);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let story = Story::spawn(9, source.clone(), sender.downgrade());
        assert!(source.wait_for_fetches(9, 1, Duration::from_secs(5)).await);
        assert_eq!(story.status(), LoadStatus::Loading);

        drop(story);
        assert!(source.wait_for_cancellations(9, 1, Duration::from_secs(5)).await);

        source.release(9);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(receiver.try_recv().is_err());
    }
}
