use crate::error::CoreError;
use async_trait::async_trait;

/// Trait for loaders that fetch raw LRC text.
///
/// Loading is the only suspension point in the sync flow. Implementations
/// run on a single thread, so their futures need not be `Send`.
#[async_trait(?Send)]
pub trait LyricsLoader {
    /// Get the loader name
    fn name(&self) -> &'static str;

    /// Fetch the lyric resource at `location`
    async fn load(&self, location: &str) -> Result<String, CoreError>;
}
