use crate::traits::StorySource;
use crate::types::{Result, StoriesError, StoryDetail, StoryId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// A plausible loaded story, titled `Story {id}`.
pub fn sample_story(id: StoryId, score: i64) -> StoryDetail {
    StoryDetail {
        title: format!("Story {}", id),
        uri: format!("https://example.com/stories/{}", id),
        posted_by: format!("user{}", id % 7),
        score,
        time: "2024-03-01T09:30:00+00:00".to_string(),
        comment_count: (id % 11) as usize,
    }
}

#[derive(Default)]
struct MockState {
    /// `None` makes the list call fail
    best_ids: Option<Vec<StoryId>>,
    stories: HashMap<StoryId, StoryDetail>,
    held: HashMap<StoryId, watch::Sender<bool>>,
    list_calls: usize,
    fetch_calls: HashMap<StoryId, usize>,
    in_flight: HashMap<StoryId, usize>,
    max_in_flight: HashMap<StoryId, usize>,
    cancelled: HashMap<StoryId, usize>,
}

/// In-memory story source for development and testing.
///
/// Fetches of a held id park until `release` is called, which lets tests
/// observe the cache while stories are still loading. A fetch whose future is
/// dropped before it completes is counted as cancelled.
pub struct MockStorySource {
    state: Mutex<MockState>,
    changed: Notify,
}

impl MockStorySource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                best_ids: Some(Vec::new()),
                ..MockState::default()
            }),
            changed: Notify::new(),
        }
    }

    pub fn with_story(self, id: StoryId, score: i64) -> Self {
        self.insert_story(id, sample_story(id, score));
        self
    }

    pub fn with_best_ids(self, ids: Vec<StoryId>) -> Self {
        self.set_best_ids(ids);
        self
    }

    pub fn insert_story(&self, id: StoryId, detail: StoryDetail) {
        self.state.lock().stories.insert(id, detail);
    }

    pub fn set_best_ids(&self, ids: Vec<StoryId>) {
        self.state.lock().best_ids = Some(ids);
    }

    pub fn fail_best_ids(&self) {
        self.state.lock().best_ids = None;
    }

    /// Park every fetch of `id` until `release(id)`.
    pub fn hold(&self, id: StoryId) {
        let (gate, _) = watch::channel(false);
        self.state.lock().held.insert(id, gate);
    }

    pub fn release(&self, id: StoryId) {
        if let Some(gate) = self.state.lock().held.remove(&id) {
            gate.send_replace(true);
        }
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn fetch_calls(&self, id: StoryId) -> usize {
        self.state.lock().fetch_calls.get(&id).copied().unwrap_or(0)
    }

    pub fn total_fetch_calls(&self) -> usize {
        self.state.lock().fetch_calls.values().sum()
    }

    /// Most fetches of `id` ever running at the same time
    pub fn max_in_flight(&self, id: StoryId) -> usize {
        self.state.lock().max_in_flight.get(&id).copied().unwrap_or(0)
    }

    pub fn cancelled(&self, id: StoryId) -> usize {
        self.state.lock().cancelled.get(&id).copied().unwrap_or(0)
    }

    /// Wait until `id` has been fetched at least `n` times. False on timeout.
    pub async fn wait_for_fetches(&self, id: StoryId, n: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, || self.fetch_calls(id) >= n).await
    }

    /// Wait until `n` fetches of `id` have been dropped mid-flight. False on timeout.
    pub async fn wait_for_cancellations(&self, id: StoryId, n: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, || self.cancelled(id) >= n).await
    }

    async fn wait_until(&self, timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let waiting = async {
            loop {
                let changed = self.changed.notified();
                if condition() {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(timeout, waiting).await.is_ok()
    }

    fn start_fetch(&self, id: StoryId) -> Option<watch::Receiver<bool>> {
        let mut state = self.state.lock();
        *state.fetch_calls.entry(id).or_insert(0) += 1;
        let running = {
            let in_flight = state.in_flight.entry(id).or_insert(0);
            *in_flight += 1;
            *in_flight
        };
        let max = state.max_in_flight.entry(id).or_insert(0);
        *max = (*max).max(running);
        let gate = state.held.get(&id).map(|gate| gate.subscribe());
        drop(state);

        self.changed.notify_waiters();
        gate
    }
}

impl Default for MockStorySource {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count however the fetch ends.
struct FetchGuard<'a> {
    source: &'a MockStorySource,
    id: StoryId,
    completed: bool,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.source.state.lock();
            if let Some(in_flight) = state.in_flight.get_mut(&self.id) {
                *in_flight = in_flight.saturating_sub(1);
            }
            if !self.completed {
                *state.cancelled.entry(self.id).or_insert(0) += 1;
            }
        }
        self.source.changed.notify_waiters();
    }
}

#[async_trait]
impl StorySource for MockStorySource {
    fn source_name(&self) -> String {
        "Mock story source".to_string()
    }

    async fn best_story_ids(&self) -> Result<Vec<StoryId>> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        state
            .best_ids
            .clone()
            .ok_or_else(|| StoriesError::General("best stories unavailable".to_string()))
    }

    async fn fetch_story(&self, id: StoryId) -> Result<StoryDetail> {
        let gate = self.start_fetch(id);
        let mut guard = FetchGuard {
            source: self,
            id,
            completed: false,
        };

        if let Some(mut gate) = gate {
            // a dropped sender means the hold was replaced; treat as released
            let _ = gate.wait_for(|open| *open).await;
        }

        let detail = self.state.lock().stories.get(&id).cloned();
        guard.completed = true;
        detail.ok_or(StoriesError::NotFound { id })
    }
}
