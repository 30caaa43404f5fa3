use crate::ranking::top_stories;
use crate::stash::{PendingRequest, Stash};
use crate::story::Story;
use crate::traits::StorySource;
use crate::types::{CacheStats, LoadStatus, Result, StoriesError, StoryDetail, StoryId};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, Notify};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, info_span, Instrument};

/// Everything the cache task reacts to, processed strictly in arrival order.
pub(crate) enum Command {
    /// Track exactly these ids, then answer once none of them is still loading
    Refresh(PendingRequest),
    /// A story's fetch attempt ended, successfully or not
    StoryFinished(StoryId),
    Stats(oneshot::Sender<CacheStats>),
}

/// Handle to the stories cache task.
///
/// When a request for best stories comes in, the cache starts loading every id
/// it has not seen yet and forgets ids that are no longer listed. The request
/// is answered as soon as no tracked story is still loading; until then it
/// waits in the stash. Every finished story re-checks, and the first check
/// that finds nothing loading answers the whole stash.
///
/// All cache state lives inside the task, so nothing here needs a lock.
#[derive(Clone)]
pub struct StoriesCache {
    commands: UnboundedSender<Command>,
}

impl StoriesCache {
    pub fn spawn(source: Arc<dyn StorySource>) -> (Self, CacheWorker) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        info!("Starting stories cache for {}", source.source_name());
        let actor = CacheActor {
            source,
            events: commands.downgrade(),
            stories: HashMap::new(),
            stash: Stash::new(),
        };
        let handle = tokio::spawn(
            actor
                .run(receiver, shutdown.clone())
                .instrument(info_span!("stories_cache")),
        );

        (Self { commands }, CacheWorker { handle, shutdown })
    }

    /// Queue a request and hand back the slot its answer will arrive in.
    pub fn submit(
        &self,
        ids: Vec<StoryId>,
        count: usize,
    ) -> Result<oneshot::Receiver<Vec<StoryDetail>>> {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .send(Command::Refresh(PendingRequest { ids, count, reply }))
            .map_err(|_| StoriesError::CacheUnavailable)?;
        Ok(receiver)
    }

    /// Track `ids` and wait for the `count` best of them.
    ///
    /// There is no timeout here; callers bound the wait themselves.
    pub async fn get_best_stories(&self, ids: Vec<StoryId>, count: usize) -> Result<Vec<StoryDetail>> {
        self.submit(ids, count)?
            .await
            .map_err(|_| StoriesError::CacheUnavailable)
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let (reply, receiver) = oneshot::channel();
        self.commands
            .send(Command::Stats(reply))
            .map_err(|_| StoriesError::CacheUnavailable)?;
        receiver.await.map_err(|_| StoriesError::CacheUnavailable)
    }
}

/// Owns the running cache task. Hold it in one place and call `shutdown()`.
///
/// Also a future resolving when the task ends, which outside of `shutdown()`
/// only happens if it faulted. Do not poll it again after it resolves.
pub struct CacheWorker {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl CacheWorker {
    /// Signal the task to stop, then wait up to `timeout` for it to dispose
    /// its stories. Stashed requests are never answered.
    pub async fn shutdown(self, timeout: Duration) -> Result<()> {
        self.shutdown.notify_one();
        match tokio::time::timeout(timeout, self.handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(StoriesError::General(format!("stories cache task failed: {}", e))),
            Err(_) => Err(StoriesError::General(format!(
                "stories cache did not stop within {:?}",
                timeout
            ))),
        }
    }
}

impl Future for CacheWorker {
    type Output = std::result::Result<(), JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}

struct CacheActor {
    source: Arc<dyn StorySource>,
    events: WeakUnboundedSender<Command>,
    stories: HashMap<StoryId, Story>,
    stash: Stash,
}

impl CacheActor {
    async fn run(mut self, mut receiver: UnboundedReceiver<Command>, shutdown: Arc<Notify>) {
        info!("Stories cache is starting");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.notified() => {
                    info!("Stories cache is stopping");
                    break;
                }

                command = receiver.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => {
                            info!("All stories cache handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        if !self.stash.is_empty() {
            info!("Abandoning {} stashed best stories requests", self.stash.len());
        }
        // dropping a story cancels its fetch
        self.stories.clear();
        info!("Stories cache is completed");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Refresh(request) => self.handle_refresh(request),
            Command::StoryFinished(id) => self.handle_story_finished(id),
            Command::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn handle_refresh(&mut self, request: PendingRequest) {
        debug!("Processing refresh of {} ids for {} stories", request.ids.len(), request.count);
        self.update_best_stories(&request.ids);
        self.stash.push(request);

        let pending = self.pending_count();
        if pending > 0 {
            info!("Stashing best stories request. Remaining: {}, stashed: {}", pending, self.stash.len());
            return;
        }

        debug!("All stories loaded, answering best stories request");
        self.release_stash();
    }

    fn handle_story_finished(&mut self, id: StoryId) {
        if !self.stories.contains_key(&id) {
            // a fetch that outran its own eviction
            debug!("Finish notification for untracked story {}", id);
        }

        let pending = self.pending_count();
        if pending > 0 {
            debug!("Story {} finished. Remaining: {}, stashed: {}", id, pending, self.stash.len());
            return;
        }

        if !self.stash.is_empty() {
            debug!("All stories loaded, answering {} stashed requests", self.stash.len());
            self.release_stash();
        }
    }

    /// Make the tracked set exactly `ids`.
    fn update_best_stories(&mut self, ids: &[StoryId]) {
        let wanted: HashSet<StoryId> = ids.iter().copied().collect();

        self.stories.retain(|id, _| {
            let keep = wanted.contains(id);
            if !keep {
                debug!("Story with id {} removed", id);
            }
            keep
        });

        for &id in &wanted {
            if !self.stories.contains_key(&id) {
                let story = Story::spawn(id, self.source.clone(), self.events.clone());
                self.stories.insert(id, story);
                debug!("Story with id {} added", id);
            }
        }
    }

    /// Stories whose fetch has not ended, read from their status rather than
    /// from notifications received. A story stores its result before it
    /// notifies, so this may see a finish early but never late, and a
    /// notification still queued from an evicted story of the same id
    /// cannot mark its replacement finished.
    fn pending_count(&self) -> usize {
        self.stories
            .values()
            .filter(|story| !story.status().is_finished())
            .count()
    }

    fn release_stash(&mut self) {
        let ranked = top_stories(
            self.stories
                .values()
                .filter_map(|story| story.detail().map(|detail| (story.id(), detail))),
            self.stash.max_count(),
        );
        for request in self.stash.drain() {
            request.answer(&ranked);
        }
    }

    fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            tracked: self.stories.len(),
            stashed: self.stash.len(),
            ..CacheStats::default()
        };
        for story in self.stories.values() {
            match story.status() {
                LoadStatus::Loaded => stats.loaded += 1,
                LoadStatus::Failed => stats.failed += 1,
                LoadStatus::NotLoaded | LoadStatus::Loading => stats.pending += 1,
            }
        }
        stats.ids = self.stories.keys().copied().collect();
        stats.ids.sort_unstable();
        stats
    }
}
