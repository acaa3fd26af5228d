mod dradio;
mod error;
mod extractor;
mod hls;
mod rtvslo;
mod types;
mod utils;

pub use error::{ExtractorError, Result};
pub use extractor::Extractor;
pub use types::{FormatCandidate, MediaRecord, SubtitleTrack, Thumbnail};

use crate::config::Config;
use dradio::DradioShareExtractor;
use reqwest::Client;
use rtvslo::RtvSloExtractor;
use tracing::info;

pub struct MediaExtractor {
    extractors: Vec<Box<dyn Extractor>>,
}

impl MediaExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.http.user_agent.as_str())
            .timeout(std::time::Duration::from_secs(config.http.timeout_secs))
            .build()?;

        let extractors: Vec<Box<dyn Extractor>> = vec![
            Box::new(DradioShareExtractor::new(client.clone())),
            Box::new(RtvSloExtractor::new(client)),
        ];

        Ok(Self { extractors })
    }

    /// Dispatches the URL to the first extractor that recognizes it and
    /// orders the resulting format list by its preference hints.
    pub async fn extract(&self, url: &str) -> Result<MediaRecord> {
        for extractor in &self.extractors {
            if extractor.can_handle(url) {
                info!(extractor = extractor.name(), url, "dispatching extraction");
                let mut record = extractor.extract(url).await?;
                record.sort_formats();
                return Ok(record);
            }
        }
        Err(ExtractorError::UnsupportedUrl(url.to_string()))
    }

    pub fn is_supported_url(&self, url: &str) -> bool {
        self.extractors.iter().any(|e| e.can_handle(url))
    }
}
