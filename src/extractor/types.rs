use serde::Serialize;
use std::collections::HashMap;

/// Normalized output of one extraction, consumed by downstream tooling.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaRecord {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Duration in seconds
    pub duration: Option<u64>,
    /// Unix timestamp of the original broadcast/publication
    pub timestamp: Option<i64>,
    /// Unix timestamp of the recording/release
    pub release_timestamp: Option<i64>,
    pub series: Option<String>,
    pub series_id: Option<String>,
    pub tags: Vec<String>,
    pub webpage_url: Option<String>,
    pub thumbnails: Vec<Thumbnail>,
    /// Language tag -> available subtitle tracks for that language
    pub subtitles: HashMap<String, Vec<SubtitleTrack>>,
    pub formats: Vec<FormatCandidate>,
}

impl MediaRecord {
    /// Orders formats best-first: preference hint, then resolution, then
    /// bitrate. Extractors only supply the hints; ordering happens here.
    pub fn sort_formats(&mut self) {
        self.formats.sort_by_key(|f| {
            std::cmp::Reverse((
                f.preference.unwrap_or(0),
                f.height.unwrap_or(0),
                f.bitrate.unwrap_or(0),
            ))
        });
    }
}

/// One downloadable rendition of a piece of media.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormatCandidate {
    pub format_id: String,
    pub url: String,
    /// Master playlist this variant was expanded from, if any
    pub manifest_url: Option<String>,
    pub ext: Option<String>,
    pub bitrate: Option<u64>,
    pub filesize: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub language: Option<String>,
    /// Audio codec hint; "none" marks a video-only rendition
    pub acodec: Option<String>,
    /// Video codec hint; "none" marks an audio-only rendition
    pub vcodec: Option<String>,
    pub preference: Option<i32>,
    pub format_note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Thumbnail {
    pub id: Option<String>,
    pub url: String,
    /// Headers required when fetching this thumbnail
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub http_headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubtitleTrack {
    pub url: String,
    pub ext: Option<String>,
}
