use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::error::{ExtractorError, Result};
use super::extractor::Extractor;
use super::types::{FormatCandidate, MediaRecord, Thumbnail};
use super::utils;

/// Publisher site name as reported by the audio player blob, mapped to
/// the code used in canonical audio IDs.
const PUBLISHER_CODES: [(&str, &str); 3] = [
    ("deutschlandfunk", "DLF"),
    ("deutschlandfunk-nova", "DRW"),
    ("deutschlandfunk-kultur", "DRK"),
];

/// Extractor for Deutschlandradio audiothek share links.
pub struct DradioShareExtractor {
    client: Client,
    valid_url: Regex,
    player_json: Regex,
    author: Regex,
    short_id: Regex,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioPlayerData {
    audio_url: String,
    #[serde(default)]
    duration: Option<serde_json::Value>,
    #[serde(default)]
    site_name: Option<String>,
}

impl DradioShareExtractor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            valid_url: Regex::new(
                r"^https?://(?:share|srv)\.deutschlandradio\.de/dlf-audiothek-audio-teilen\.(?:3265\.de\.)?html\?(?:mdm:)?audio_id=(dira_(?:DLF|DRK|DRW)_[a-f0-9]{8}|\d+)",
            )
            .unwrap(),
            player_json: Regex::new(r#"<div class="js-audio-player" data-json="([^"]+)">"#)
                .unwrap(),
            author: Regex::new(r#"<p class="box-details-author">(.+?)</p>"#).unwrap(),
            short_id: Regex::new(r"([a-f0-9]+)\.mp3$").unwrap(),
        }
    }

    fn match_id<'a>(&self, url: &'a str) -> Option<&'a str> {
        self.valid_url
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Rewrites a legacy numeric audio ID into the canonical
    /// `dira_<CODE>_<hex>` form so repeated extractions of the same clip
    /// resolve to one archive entry. Falls back to the numeric ID when
    /// either the publisher or the hex digest cannot be determined.
    fn canonical_id(&self, numeric_id: &str, src: &AudioPlayerData) -> String {
        let short_id = self
            .short_id
            .captures(&src.audio_url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        let site_abbr = src.site_name.as_deref().and_then(|name| {
            PUBLISHER_CODES
                .iter()
                .find(|(site, _)| *site == name)
                .map(|(_, code)| *code)
        });
        match (site_abbr, short_id) {
            (Some(code), Some(hex)) => format!("dira_{code}_{hex}"),
            _ => {
                warn!(
                    id = numeric_id,
                    "could not derive canonical audio ID, download archives may be inaccurate"
                );
                numeric_id.to_string()
            }
        }
    }

    fn parse_share_page(&self, aid: &str, page: &str) -> Result<MediaRecord> {
        let raw = self
            .player_json
            .captures(page)
            .and_then(|c| c.get(1))
            .map(|m| utils::unescape_html(m.as_str()))
            .ok_or_else(|| ExtractorError::Parse("audio player data".to_string()))?;
        let src: AudioPlayerData = serde_json::from_str(&raw)?;

        let author = self
            .author
            .captures(page)
            .and_then(|c| c.get(1))
            .map(|m| utils::unescape_html(m.as_str().trim()));

        let id = if aid.bytes().all(|b| b.is_ascii_digit()) {
            self.canonical_id(aid, &src)
        } else {
            aid.to_string()
        };

        let thumbnails = utils::html_search_meta(page, &["og:image", "twitter:image"])
            .map(|url| {
                vec![Thumbnail {
                    id: None,
                    url,
                    http_headers: HashMap::new(),
                }]
            })
            .unwrap_or_default();

        let formats = vec![FormatCandidate {
            format_id: "audio".to_string(),
            ext: utils::ext_from_url(&src.audio_url),
            url: src.audio_url.clone(),
            ..Default::default()
        }];

        Ok(MediaRecord {
            id,
            title: utils::html_search_meta(page, &["og:title", "twitter:title"]),
            description: utils::html_search_meta(
                page,
                &["description", "og:description", "twitter:description"],
            ),
            author,
            duration: utils::int_or_none(src.duration.as_ref()),
            thumbnails,
            formats,
            ..Default::default()
        })
    }
}

#[async_trait]
impl Extractor for DradioShareExtractor {
    fn name(&self) -> &'static str {
        "dradio:share"
    }

    fn can_handle(&self, url: &str) -> bool {
        self.valid_url.is_match(url)
    }

    async fn extract(&self, url: &str) -> Result<MediaRecord> {
        let aid = self
            .match_id(url)
            .ok_or_else(|| ExtractorError::Parse("audio ID".to_string()))?
            .to_string();
        debug!(id = %aid, "fetching share page");
        let page = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        self.parse_share_page(&aid, &page)
    }
}
