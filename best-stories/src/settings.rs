use crate::types::{CacheConfig, FetchConfig, Result, ServerConfig};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variables with this prefix override file settings,
/// e.g. `BEST_STORIES__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "BEST_STORIES";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub hacker_news: FetchConfig,
    pub cache: CacheConfig,
}

impl Settings {
    /// Defaults, then the file at `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn defaults_without_sources() {
        let settings = Settings::build(Config::builder()).unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.hacker_news.base_url, "https://hacker-news.firebaseio.com/v0/");
        assert_eq!(settings.hacker_news.max_connections_per_host, 50);
        assert!(!settings.hacker_news.accept_invalid_certs);
        assert_eq!(settings.cache.request_timeout_seconds, 30);
    }

    #[test]
    fn file_overrides_only_what_it_names() {
        let toml = r#"
            [server]
            port = 9000

            [hacker_news]
            base_url = "http://localhost:5000/v0/"
            timeout_seconds = 5
        "#;
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));

        let settings = Settings::build(builder).unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.hacker_news.base_url, "http://localhost:5000/v0/");
        assert_eq!(settings.hacker_news.timeout_seconds, 5);
        assert_eq!(settings.hacker_news.user_agent, "Best-Stories/0.1");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/best-stories.toml"))).is_err());
    }
}
