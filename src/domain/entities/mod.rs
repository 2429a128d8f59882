//! Domain entity definitions.

mod cache_key;
mod target_tag;

pub use cache_key::{CACHE_FILE_EXTENSION, CacheKey, ImageSource};
pub use target_tag::{Binding, TargetTag};
