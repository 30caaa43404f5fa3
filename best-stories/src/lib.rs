pub mod types;
pub mod traits;
pub mod fetcher;
pub mod mock;
pub mod story;
pub mod stash;
pub mod ranking;
pub mod stories_cache;
pub mod service;
pub mod settings;
pub mod http;

pub use types::*;
pub use traits::StorySource;
pub use fetcher::Fetcher;
pub use mock::{sample_story, MockStorySource};
pub use story::Story;
pub use stories_cache::{CacheWorker, StoriesCache};
pub use service::BestStoriesService;
pub use settings::Settings;
