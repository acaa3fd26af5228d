use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::error::{ExtractorError, Result};
use super::extractor::Extractor;
use super::hls;
use super::types::{FormatCandidate, MediaRecord, SubtitleTrack, Thumbnail};
use super::utils;

const API_BASE: &str = "https://api.rtvslo.si/ava";
/// Public client identifier the archive frontend sends with every call.
const CLIENT_ID: &str = "82013fb3a531d5414f478747c1aca622";
const GEO_COUNTRIES: &[&str] = &["SI"];
const SIGN_LANGUAGE_NOTE: &str = "Sign language interpretation";
const SIGN_LANGUAGE_PREFERENCE: i32 = -10;
/// Subtitle language names the API spells out instead of tagging.
const SUB_LANGS: [(&str, &str); 1] = [("Slovenski", "sl")];

/// Extractor for the RTV Slovenia 365 archive.
pub struct RtvSloExtractor {
    client: Client,
    valid_url: Regex,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    response: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RecordingMeta {
    title: Option<String>,
    description: Option<String>,
    duration: Option<Value>,
    length: Option<String>,
    jwt: Option<String>,
    stub: Option<String>,
    images: Option<HashMap<String, String>>,
    subs: Option<Vec<SubtitleEntry>>,
    subtitles: Option<Vec<SubtitleEntry>>,
    broadcast_date: Option<String>,
    broadcast_dates: Option<Vec<String>>,
    recording_date: Option<String>,
    canonical: Option<Canonical>,
    genre: Option<Value>,
    show_name: Option<String>,
    show_id: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Canonical {
    domain: Option<String>,
    path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubtitleEntry {
    language: Option<String>,
    file: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MediaDescriptors {
    addaptive_media: Option<AdaptiveMedia>,
    #[serde(rename = "addaptiveMedia_sl")]
    addaptive_media_sl: Option<AdaptiveMedia>,
    media_files: Vec<MediaFileEntry>,
    #[serde(rename = "mediaFiles_sl")]
    media_files_sl: Vec<MediaFileEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AdaptiveMedia {
    hls_sec: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MediaFileEntry {
    bitrate: Option<Value>,
    filesize: Option<Value>,
    width: Option<Value>,
    height: Option<Value>,
    media_type: Option<String>,
    streams: Option<HashMap<String, String>>,
}

impl RtvSloExtractor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            valid_url: Regex::new(
                r"^https?://(?:(?:365|4d)\.rtvslo\.si/arhiv/[^/?#&;]+|(?:www\.)?rtvslo\.si/rtv365/arhiv)/(\d+)",
            )
            .unwrap(),
        }
    }

    fn match_id<'a>(&self, url: &'a str) -> Option<&'a str> {
        self.valid_url
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    async fn call_api<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        id: &str,
        jwt: Option<&str>,
    ) -> Result<T> {
        let url = format!("{API_BASE}/{operation}/{id}");
        let mut request = self.client.get(&url).query(&[("client_id", CLIENT_ID)]);
        if let Some(token) = jwt {
            request = request.query(&[("jwt", token)]);
        }
        let envelope: ApiEnvelope<T> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(envelope.response)
    }
}

/// The short-lived token from `getRecordingDrm` authorizes the `getMedia`
/// call; without it there is nothing further to fetch.
fn require_token(meta: &RecordingMeta) -> Result<String> {
    meta.jwt
        .clone()
        .filter(|token| !token.is_empty())
        .ok_or(ExtractorError::AuthenticationMissing)
}

fn apply_sign_language_attrs(format: &mut FormatCandidate) {
    format.format_id = format!("sign-{}", format.format_id);
    format.format_note = Some(SIGN_LANGUAGE_NOTE.to_string());
    format.preference = Some(SIGN_LANGUAGE_PREFERENCE);
    // The provider tags the sign track's audible renditions "eng" even
    // though the audio is Slovenian; only those get remapped.
    if format.language.as_deref() == Some("eng")
        && format.acodec.as_deref().is_some_and(|codec| codec != "none")
    {
        format.language = Some("slv".to_string());
    }
}

/// One candidate per file per transport scheme that actually carries a
/// URL. A file missing a transport is an expected state, not a fault.
fn file_formats(files: &[MediaFileEntry], sign_language: bool) -> Vec<FormatCandidate> {
    let id_prefix = if sign_language { "files-sl" } else { "files" };
    let mut formats = Vec::new();
    for transport in ["http", "https"] {
        for file in files {
            let Some(stream_url) = file.streams.as_ref().and_then(|s| s.get(transport)) else {
                continue;
            };
            let ext = file
                .media_type
                .as_deref()
                .map(str::to_lowercase)
                .filter(|e| !e.is_empty());
            let bitrate = utils::int_or_none(file.bitrate.as_ref());
            formats.push(FormatCandidate {
                format_id: format!(
                    "{id_prefix}_{transport}_{}_{}",
                    ext.as_deref().unwrap_or(""),
                    bitrate.map(|b| b.to_string()).unwrap_or_default()
                ),
                url: stream_url.clone(),
                ext,
                bitrate,
                filesize: utils::int_or_none(file.filesize.as_ref()),
                width: utils::int_or_none(file.width.as_ref()).map(|w| w as u32),
                height: utils::int_or_none(file.height.as_ref()).map(|h| h as u32),
                format_note: sign_language.then(|| SIGN_LANGUAGE_NOTE.to_string()),
                preference: sign_language.then_some(SIGN_LANGUAGE_PREFERENCE),
                ..Default::default()
            });
        }
    }
    formats
}

fn build_record(v_id: &str, meta: &RecordingMeta, formats: Vec<FormatCandidate>) -> MediaRecord {
    let thumbnails = meta
        .images
        .as_ref()
        .map(|images| {
            images
                .iter()
                .map(|(label, url)| Thumbnail {
                    id: Some(label.clone()),
                    url: url.clone(),
                    http_headers: HashMap::from([(
                        "Accept".to_string(),
                        "image/jpeg".to_string(),
                    )]),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut subtitles: HashMap<String, Vec<SubtitleTrack>> = HashMap::new();
    for entry in meta
        .subs
        .as_deref()
        .or(meta.subtitles.as_deref())
        .unwrap_or_default()
    {
        let Some(file) = entry.file.clone() else {
            continue;
        };
        let lang = match entry.language.as_deref() {
            Some(name) if !name.is_empty() => SUB_LANGS
                .iter()
                .find(|(spelled, _)| *spelled == name)
                .map(|(_, tag)| tag.to_string())
                .unwrap_or_else(|| name.to_string()),
            _ => "und".to_string(),
        };
        subtitles.entry(lang).or_default().push(SubtitleTrack {
            url: file,
            ext: entry
                .format
                .as_deref()
                .map(str::to_lowercase)
                .filter(|e| !e.is_empty()),
        });
    }

    let timestamp = meta
        .broadcast_date
        .as_deref()
        .filter(|d| !d.is_empty())
        .or_else(|| {
            meta.broadcast_dates
                .as_ref()
                .and_then(|dates| dates.first())
                .map(String::as_str)
        })
        .and_then(utils::unified_timestamp);

    let webpage_url = meta.canonical.as_ref().and_then(|c| match (&c.domain, &c.path) {
        (Some(domain), Some(path)) => Some(format!("{domain}{path}")),
        _ => None,
    });

    let tags = match &meta.genre {
        Some(Value::String(genre)) if !genre.is_empty() => vec![genre.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    MediaRecord {
        id: v_id.to_string(),
        title: meta.title.clone(),
        description: meta.description.clone(),
        duration: utils::int_or_none(meta.duration.as_ref())
            .filter(|d| *d > 0)
            .or_else(|| meta.length.as_deref().and_then(utils::parse_duration)),
        timestamp,
        release_timestamp: meta
            .recording_date
            .as_deref()
            .and_then(utils::unified_timestamp),
        series: meta.show_name.clone(),
        series_id: utils::str_or_none(meta.show_id.as_ref()),
        tags,
        webpage_url,
        thumbnails,
        subtitles,
        formats,
        ..Default::default()
    }
}

/// The provider serves placeholder clips instead of HTTP errors; the
/// placeholder URLs identify the actual condition.
fn detect_provider_markers(record: MediaRecord, stub: Option<&str>) -> Result<MediaRecord> {
    if record
        .formats
        .iter()
        .any(|f| f.url.contains("intermission.mp4"))
    {
        return Err(ExtractorError::GeoRestricted {
            countries: GEO_COUNTRIES.to_vec(),
            record: Box::new(record),
        });
    }
    let dummy_manifest = record.formats.iter().any(|f| {
        f.manifest_url
            .as_deref()
            .is_some_and(|m| m.contains("dummy_720p.mp4"))
    });
    if dummy_manifest && stub == Some("error") {
        return Err(ExtractorError::Unavailable {
            site: "rtvslo.si",
            message: "Clip not available".to_string(),
        });
    }
    Ok(record)
}

#[async_trait]
impl Extractor for RtvSloExtractor {
    fn name(&self) -> &'static str {
        "rtvslo.si"
    }

    fn can_handle(&self, url: &str) -> bool {
        self.valid_url.is_match(url)
    }

    async fn extract(&self, url: &str) -> Result<MediaRecord> {
        let v_id = self
            .match_id(url)
            .ok_or_else(|| ExtractorError::Parse("recording ID".to_string()))?
            .to_string();

        debug!(id = %v_id, "requesting recording metadata");
        let meta = self
            .call_api::<RecordingMeta>("getRecordingDrm", &v_id, None)
            .await?;
        let jwt = require_token(&meta)?;

        debug!(id = %v_id, "requesting media descriptors");
        let media = self
            .call_api::<MediaDescriptors>("getMedia", &v_id, Some(&jwt))
            .await?;

        let mut formats = Vec::new();
        if let Some(adaptive_url) = media
            .addaptive_media
            .as_ref()
            .and_then(|m| m.hls_sec.as_deref())
        {
            formats.extend(
                hls::extract_wowza_formats(&self.client, adaptive_url, &[hls::PROTOCOL_SMIL])
                    .await?,
            );
        }
        formats.extend(file_formats(&media.media_files, false));

        if let Some(adaptive_url) = media
            .addaptive_media_sl
            .as_ref()
            .and_then(|m| m.hls_sec.as_deref())
        {
            for mut format in
                hls::extract_wowza_formats(&self.client, adaptive_url, &[hls::PROTOCOL_SMIL])
                    .await?
            {
                apply_sign_language_attrs(&mut format);
                formats.push(format);
            }
        }
        formats.extend(file_formats(&media.media_files_sl, true));

        let mut record = build_record(&v_id, &meta, formats);
        record.sort_formats();
        detect_provider_markers(record, meta.stub.as_deref())
    }
}
