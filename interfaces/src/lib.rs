pub mod defs;

pub use defs::{StoryDetail, StoryId};
