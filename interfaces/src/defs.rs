use serde::{Deserialize, Serialize};

/// Identifier of a remote story. Assigned by the remote API, never reused.
pub type StoryId = u64;

/// A fully loaded story, as handed to clients.
///
/// Serialized with the field names clients already consume:
/// `{title, uri, postedBy, score, time, commentCount}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDetail {
    pub title: String,
    pub uri: String,
    pub posted_by: String,
    pub score: i64,
    /// ISO-8601 with offset, e.g. `2024-03-01T09:30:00+00:00`.
    pub time: String,
    pub comment_count: usize,
}

// Object style note:
// These are plain records. Anything that fetches, caches or ranks them lives
// in the service crate; this crate only pins down the shape both sides agree on.
