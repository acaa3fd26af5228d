use thiserror::Error;

use super::types::MediaRecord;

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unable to extract {0}")]
    Parse(String),

    #[error("site did not provide an authentication token, cannot proceed")]
    AuthenticationMissing,

    /// The provider blocks playback outside its licensed countries. The
    /// metadata gathered before the block is still attached.
    #[error("content is not available from your location; available in: {}", countries.join(", "))]
    GeoRestricted {
        countries: Vec<&'static str>,
        record: Box<MediaRecord>,
    },

    /// Provider-signaled unavailability, reported to the user as-is.
    #[error("{site} said: {message}")]
    Unavailable { site: &'static str, message: String },

    #[error("no extractor supports this URL: {0}")]
    UnsupportedUrl(String),
}

impl ExtractorError {
    /// Expected errors come from provider behavior known in advance and
    /// should be shown to the user rather than treated as a bug.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ExtractorError::Unavailable { .. } | ExtractorError::GeoRestricted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExtractorError>;
