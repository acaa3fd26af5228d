use super::error::Result;
use super::types::MediaRecord;
use async_trait::async_trait;

#[async_trait]
pub trait Extractor: Send + Sync {
    /// Human-readable name of the extractor
    fn name(&self) -> &'static str;

    /// Whether this extractor recognizes the given URL
    fn can_handle(&self, url: &str) -> bool;

    /// Fetch the documents behind the URL and assemble a media record
    async fn extract(&self, url: &str) -> Result<MediaRecord>;
}
