use crate::types::{StoryDetail, StoryId};
use std::collections::VecDeque;
use tokio::sync::oneshot;
use tracing::debug;

/// A best stories request waiting on the cache.
pub struct PendingRequest {
    pub ids: Vec<StoryId>,
    pub count: usize,
    pub reply: oneshot::Sender<Vec<StoryDetail>>,
}

impl PendingRequest {
    /// Consumes the request, so each one is answered at most once.
    pub fn answer(self, ranked: &[StoryDetail]) {
        let take = self.count.min(ranked.len());
        if self.reply.send(ranked[..take].to_vec()).is_err() {
            debug!("Best stories requester went away before the answer");
        }
    }
}

/// Requests whose ids are already tracked but whose stories are still loading.
/// Owned by the cache task; first in, first answered.
#[derive(Default)]
pub struct Stash {
    requests: VecDeque<PendingRequest>,
}

impl Stash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PendingRequest) {
        self.requests.push_back(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Largest `count` among the stashed requests
    pub fn max_count(&self) -> usize {
        self.requests.iter().map(|r| r.count).max().unwrap_or(0)
    }

    /// Takes every request out, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = PendingRequest> + '_ {
        self.requests.drain(..)
    }
}
