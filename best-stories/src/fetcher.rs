use crate::traits::StorySource;
use crate::types::{FetchConfig, ItemJson, Result, StoriesError, StoryDetail, StoryId};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

const BEST_STORIES_PATH: &str = "beststories.json";

pub struct Fetcher {
    client: Client,
    base_url: Url,
    /// Caps requests in flight against the remote host
    connections: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(config.max_connections_per_host)
            .gzip(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        let max_connections = config.max_connections_per_host.max(1);
        debug!("Fetcher configured with max {} connections", max_connections);

        Ok(Self {
            client,
            base_url: parse_base_url(&config.base_url)?,
            connections: Arc::new(Semaphore::new(max_connections)),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path)?;
        // held until the body is read
        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(|e| StoriesError::General(format!("connection limit closed: {}", e)))?;
        let start_time = Instant::now();

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(StoriesError::General(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let body = response.bytes().await?;
        debug!(
            "Fetched {} ({} bytes in {}ms)",
            url,
            body.len(),
            start_time.elapsed().as_millis()
        );
        serde_json::from_slice(&body).map_err(|e| StoriesError::Decode(format!("{}: {}", url, e)))
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`
fn parse_base_url(raw: &str) -> Result<Url> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}

#[async_trait]
impl StorySource for Fetcher {
    fn source_name(&self) -> String {
        format!("Hacker News ({})", self.base_url)
    }

    async fn best_story_ids(&self) -> Result<Vec<StoryId>> {
        // The API answers `null` rather than `[]` when it has nothing
        let ids: Option<Vec<StoryId>> = self.get_json(BEST_STORIES_PATH).await?;
        Ok(ids.unwrap_or_default())
    }

    async fn fetch_story(&self, id: StoryId) -> Result<StoryDetail> {
        let item: Option<ItemJson> = self.get_json(&format!("item/{}.json", id)).await?;
        match item {
            Some(item) => item.into_detail(id),
            None => Err(StoriesError::NotFound { id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_without_trailing_slash_keeps_its_path() {
        let url = parse_base_url("https://hacker-news.firebaseio.com/v0").unwrap();
        assert_eq!(
            url.join("item/1.json").unwrap().as_str(),
            "https://hacker-news.firebaseio.com/v0/item/1.json"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let config = FetchConfig {
            base_url: "not a url".to_string(),
            ..FetchConfig::default()
        };
        assert!(matches!(Fetcher::new(&config), Err(StoriesError::InvalidUrl(_))));
    }
}
