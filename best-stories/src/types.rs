use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
// Use the interfaces crate for the wire types shared with clients
pub use interfaces::defs::{StoryDetail, StoryId};

/// Shape of `item/{id}.json` as served by the remote API.
///
/// Every field but `kids` is required; a payload that lacks one fails to
/// decode and only that story's fetch fails.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemJson {
    pub title: String,
    pub url: String,
    pub by: String,
    pub score: i64,
    /// Unix epoch seconds
    pub time: i64,
    #[serde(default)]
    pub kids: Option<Vec<StoryId>>,
}

impl ItemJson {
    pub fn into_detail(self, id: StoryId) -> Result<StoryDetail> {
        let posted_at = DateTime::<Utc>::from_timestamp(self.time, 0).ok_or_else(|| {
            StoriesError::Decode(format!("story {} has out of range time {}", id, self.time))
        })?;

        Ok(StoryDetail {
            title: self.title,
            uri: self.url,
            posted_by: self.by,
            score: self.score,
            time: posted_at.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            comment_count: self.kids.map(|kids| kids.len()).unwrap_or(0),
        })
    }
}

/// Where a story is in its single fetch attempt.
///
/// `Loaded` and `Failed` are both terminal: the coordinator counts either as
/// finished, and only `Loaded` stories take part in ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum LoadStatus {
    NotLoaded = 0,
    Loading = 1,
    Loaded = 2,
    Failed = 3,
}

impl LoadStatus {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LoadStatus::Loading,
            2 => LoadStatus::Loaded,
            3 => LoadStatus::Failed,
            _ => LoadStatus::NotLoaded,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, LoadStatus::Loaded | LoadStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    /// Requests allowed in flight at once; also the idle pool size
    pub max_connections_per_host: usize,
    /// Skip TLS certificate validation. Development only.
    pub accept_invalid_certs: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hacker-news.firebaseio.com/v0/".to_string(),
            user_agent: "Best-Stories/0.1".to_string(),
            timeout_seconds: 30,
            max_connections_per_host: 50,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on how long a client request waits for the cache to answer
    pub request_timeout_seconds: u64,
    /// How long shutdown waits for the cache task to dispose its stories
    pub shutdown_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 30,
            shutdown_timeout_ms: 500,
        }
    }
}

/// Point-in-time view of the cache, answered in order with the other commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub tracked: usize,
    pub loaded: usize,
    pub failed: usize,
    pub pending: usize,
    pub stashed: usize,
    /// Tracked ids, ascending
    pub ids: Vec<StoryId>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoriesError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Story not found: {id}")]
    NotFound { id: StoryId },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Timed out waiting for best stories")]
    Timeout,

    #[error("Stories cache is not running")]
    CacheUnavailable,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, StoriesError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn item(kids: Option<Vec<StoryId>>) -> ItemJson {
        ItemJson {
            title: "My YC app: Dropbox".to_string(),
            url: "http://www.getdropbox.com/u/2/screencast.html".to_string(),
            by: "dhouston".to_string(),
            score: 111,
            time: 1175714200,
            kids,
        }
    }

    #[test]
    fn maps_item_payload_to_detail() {
        let detail = item(Some(vec![9224, 8917, 8884])).into_detail(8863).unwrap();

        assert_eq!(detail.title, "My YC app: Dropbox");
        assert_eq!(detail.uri, "http://www.getdropbox.com/u/2/screencast.html");
        assert_eq!(detail.posted_by, "dhouston");
        assert_eq!(detail.score, 111);
        assert_eq!(detail.time, "2007-04-04T19:16:40+00:00");
        assert_eq!(detail.comment_count, 3);
    }

    #[test]
    fn missing_kids_means_no_comments() {
        let detail = item(None).into_detail(8863).unwrap();
        assert_eq!(detail.comment_count, 0);
    }

    #[test]
    fn payload_missing_required_field_fails_to_decode() {
        let raw = r#"{"title":"t","by":"u","score":1,"time":1175714200}"#;
        assert!(serde_json::from_str::<ItemJson>(raw).is_err());

        let raw = r#"{"title":null,"url":"u","by":"u","score":1,"time":1175714200}"#;
        assert!(serde_json::from_str::<ItemJson>(raw).is_err());
    }

    #[test]
    fn out_of_range_time_is_a_decode_error() {
        let mut bad = item(None);
        bad.time = i64::MAX;
        assert!(matches!(bad.into_detail(1), Err(StoriesError::Decode(_))));
    }

    #[test]
    fn terminal_statuses() {
        assert!(LoadStatus::Loaded.is_finished());
        assert!(LoadStatus::Failed.is_finished());
        assert!(!LoadStatus::Loading.is_finished());
        assert!(!LoadStatus::NotLoaded.is_finished());
        assert_eq!(LoadStatus::from_u8(LoadStatus::Failed as u8), LoadStatus::Failed);
    }
}
