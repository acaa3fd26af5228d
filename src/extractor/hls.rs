use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

use super::error::Result;
use super::types::FormatCandidate;

pub const PROTOCOL_HLS: &str = "hls";
pub const PROTOCOL_SMIL: &str = "smil";

static MANIFEST_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:manifest|playlist|jwplayer)\.(?:m3u8|f4m|mpd|smil)$").unwrap());
static HLS_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Z0-9-]+)=("[^"]*"|[^",]+)"#).unwrap());
static SMIL_VIDEO: Lazy<Regex> = Lazy::new(|| Regex::new(r"<video\b[^>]*>").unwrap());
static XML_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([a-zA-Z][a-zA-Z0-9_:-]*)="([^"]*)""#).unwrap());

/// Expands a wowza-style streaming URL into concrete format candidates by
/// probing the sub-protocol manifests reachable from it. Protocols named
/// in `skip_protocols` are not fetched.
pub async fn extract_wowza_formats(
    client: &Client,
    manifest_url: &str,
    skip_protocols: &[&str],
) -> Result<Vec<FormatCandidate>> {
    let (base, query) = split_manifest_url(manifest_url);
    let mut formats = Vec::new();

    if !skip_protocols.contains(&PROTOCOL_HLS) {
        let playlist_url = join_query(&format!("{base}/playlist.m3u8"), &query);
        debug!(url = %playlist_url, "fetching HLS master playlist");
        let body = client
            .get(&playlist_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        formats.extend(parse_master_playlist(&body, &playlist_url));
    }

    if !skip_protocols.contains(&PROTOCOL_SMIL) {
        let smil_url = join_query(&format!("{base}/jwplayer.smil"), &query);
        debug!(url = %smil_url, "fetching SMIL document");
        let body = client
            .get(&smil_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        formats.extend(parse_smil(&body, &smil_url));
    }

    Ok(formats)
}

/// Strips a trailing manifest file name so sub-protocol manifests can be
/// derived from the stream base. The query string carries access tokens
/// and is preserved separately.
fn split_manifest_url(manifest_url: &str) -> (String, String) {
    let (path, query) = match manifest_url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (manifest_url, ""),
    };
    (
        MANIFEST_SUFFIX.replace(path, "").into_owned(),
        query.to_string(),
    )
}

fn join_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{query}")
    }
}

fn parse_hls_attributes(line: &str) -> HashMap<String, String> {
    HLS_ATTR
        .captures_iter(line)
        .map(|c| (c[1].to_string(), c[2].trim_matches('"').to_string()))
        .collect()
}

/// Parses an HLS master playlist into one candidate per variant stream,
/// plus audio-only candidates for media-level renditions with their own
/// URI.
pub fn parse_master_playlist(body: &str, playlist_url: &str) -> Vec<FormatCandidate> {
    let mut formats = Vec::new();
    let mut audio_groups: HashMap<String, String> = HashMap::new();
    let mut pending: Option<HashMap<String, String>> = None;

    for line in body.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA:") {
            let attrs = parse_hls_attributes(rest);
            if attrs.get("TYPE").map(String::as_str) != Some("AUDIO") {
                continue;
            }
            if let (Some(group), Some(language)) = (attrs.get("GROUP-ID"), attrs.get("LANGUAGE")) {
                audio_groups.insert(group.clone(), language.clone());
            }
            if let Some(uri) = attrs.get("URI") {
                let name = attrs
                    .get("NAME")
                    .or_else(|| attrs.get("GROUP-ID"))
                    .map(String::as_str)
                    .unwrap_or("0");
                formats.push(FormatCandidate {
                    format_id: format!("audio-{name}"),
                    url: resolve(playlist_url, uri),
                    manifest_url: Some(playlist_url.to_string()),
                    language: attrs.get("LANGUAGE").cloned(),
                    vcodec: Some("none".to_string()),
                    ..Default::default()
                });
            }
        } else if let Some(rest) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            pending = Some(parse_hls_attributes(rest));
        } else if !line.is_empty() && !line.starts_with('#') {
            if let Some(attrs) = pending.take() {
                formats.push(variant_format(&attrs, line, playlist_url, &audio_groups));
            }
        }
    }

    formats
}

fn variant_format(
    attrs: &HashMap<String, String>,
    uri: &str,
    playlist_url: &str,
    audio_groups: &HashMap<String, String>,
) -> FormatCandidate {
    let bitrate = attrs.get("BANDWIDTH").and_then(|b| b.parse::<u64>().ok());
    let (width, height) = attrs
        .get("RESOLUTION")
        .and_then(|r| r.split_once('x'))
        .map(|(w, h)| (w.parse().ok(), h.parse().ok()))
        .unwrap_or((None, None));
    let (acodec, vcodec) = attrs
        .get("CODECS")
        .map(|c| split_codecs(c))
        .unwrap_or((None, None));
    let language = attrs
        .get("AUDIO")
        .and_then(|group| audio_groups.get(group))
        .cloned();

    FormatCandidate {
        format_id: format!("hls-{}", bitrate.map(|b| b / 1000).unwrap_or(0)),
        url: resolve(playlist_url, uri),
        manifest_url: Some(playlist_url.to_string()),
        ext: Some("mp4".to_string()),
        bitrate,
        width,
        height,
        language,
        acodec,
        vcodec,
        ..Default::default()
    }
}

/// Splits an RFC 6381 codec list into audio/video hints. A declared codec
/// list without an audio entry means the variant has no audio track.
fn split_codecs(codecs: &str) -> (Option<String>, Option<String>) {
    let mut acodec: Option<String> = None;
    let mut vcodec: Option<String> = None;
    for codec in codecs.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let family = codec.split('.').next().unwrap_or(codec);
        match family {
            "mp4a" | "ac-3" | "ec-3" | "opus" | "vorbis" | "flac" => {
                acodec.get_or_insert_with(|| codec.to_string());
            }
            _ => {
                vcodec.get_or_insert_with(|| codec.to_string());
            }
        }
    }
    if acodec.is_none() && vcodec.is_none() {
        return (None, None);
    }
    (
        Some(acodec.unwrap_or_else(|| "none".to_string())),
        Some(vcodec.unwrap_or_else(|| "none".to_string())),
    )
}

/// Parses a wowza SMIL document into one candidate per `<video>` node.
pub fn parse_smil(body: &str, smil_url: &str) -> Vec<FormatCandidate> {
    let mut formats = Vec::new();
    for node in SMIL_VIDEO.find_iter(body) {
        let attrs: HashMap<String, String> = XML_ATTR
            .captures_iter(node.as_str())
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();
        let Some(src) = attrs.get("src") else {
            continue;
        };
        let bitrate = attrs.get("system-bitrate").and_then(|b| b.parse::<u64>().ok());
        formats.push(FormatCandidate {
            format_id: format!("smil-{}", bitrate.map(|b| b / 1000).unwrap_or(0)),
            url: resolve(smil_url, src),
            manifest_url: Some(smil_url.to_string()),
            bitrate,
            width: attrs.get("width").and_then(|v| v.parse().ok()),
            height: attrs.get("height").and_then(|v| v.parse().ok()),
            ..Default::default()
        });
    }
    formats
}

fn resolve(base: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return reference.to_string();
    }
    Url::parse(base)
        .and_then(|b| b.join(reference))
        .map(String::from)
        .unwrap_or_else(|_| reference.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER_PLAYLIST: &str = "\
#EXTM3U
#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aac\",NAME=\"English\",LANGUAGE=\"eng\",DEFAULT=YES,URI=\"audio/eng/playlist.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=1200000,RESOLUTION=1280x720,CODECS=\"avc1.64001f,mp4a.40.2\",AUDIO=\"aac\"
chunklist_b1200000.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=500000,RESOLUTION=640x360,CODECS=\"avc1.42c01e\"
chunklist_b500000.m3u8
";

    #[test]
    fn test_parse_master_playlist() {
        let formats =
            parse_master_playlist(MASTER_PLAYLIST, "https://str.example.com/live/playlist.m3u8");
        assert_eq!(formats.len(), 3);

        let audio = &formats[0];
        assert_eq!(audio.format_id, "audio-English");
        assert_eq!(audio.language.as_deref(), Some("eng"));
        assert_eq!(audio.vcodec.as_deref(), Some("none"));
        assert_eq!(audio.url, "https://str.example.com/live/audio/eng/playlist.m3u8");

        let hd = &formats[1];
        assert_eq!(hd.format_id, "hls-1200");
        assert_eq!(hd.bitrate, Some(1_200_000));
        assert_eq!((hd.width, hd.height), (Some(1280), Some(720)));
        assert_eq!(hd.vcodec.as_deref(), Some("avc1.64001f"));
        assert_eq!(hd.acodec.as_deref(), Some("mp4a.40.2"));
        assert_eq!(hd.language.as_deref(), Some("eng"));
        assert_eq!(hd.url, "https://str.example.com/live/chunklist_b1200000.m3u8");
        assert_eq!(
            hd.manifest_url.as_deref(),
            Some("https://str.example.com/live/playlist.m3u8")
        );

        let sd = &formats[2];
        assert_eq!(sd.format_id, "hls-500");
        // codec list with no audio entry marks the variant as silent
        assert_eq!(sd.acodec.as_deref(), Some("none"));
        assert_eq!(sd.vcodec.as_deref(), Some("avc1.42c01e"));
        assert_eq!(sd.language, None);
    }

    #[test]
    fn test_parse_master_playlist_without_codecs() {
        let body = "\
#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000
https://cdn.example.com/abs/chunklist.m3u8
";
        let formats = parse_master_playlist(body, "https://str.example.com/live/playlist.m3u8");
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].acodec, None);
        assert_eq!(formats[0].vcodec, None);
        assert_eq!(formats[0].url, "https://cdn.example.com/abs/chunklist.m3u8");
    }

    #[test]
    fn test_parse_smil() {
        let body = r#"
<smil>
  <body>
    <switch>
      <video src="clip_1200.mp4" system-bitrate="1200000" width="1280" height="720"/>
      <video src="clip_500.mp4" system-bitrate="500000" width="640" height="360"/>
    </switch>
  </body>
</smil>
"#;
        let formats = parse_smil(body, "https://str.example.com/vod/jwplayer.smil");
        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0].format_id, "smil-1200");
        assert_eq!(formats[0].url, "https://str.example.com/vod/clip_1200.mp4");
        assert_eq!(formats[1].height, Some(360));
    }

    #[test]
    fn test_split_manifest_url_keeps_token_query() {
        let (base, query) = split_manifest_url(
            "https://str.example.com/vod/_definst_/clip.smil/playlist.m3u8?token=abc123",
        );
        assert_eq!(base, "https://str.example.com/vod/_definst_/clip.smil");
        assert_eq!(query, "token=abc123");
        assert_eq!(
            join_query(&format!("{base}/jwplayer.smil"), &query),
            "https://str.example.com/vod/_definst_/clip.smil/jwplayer.smil?token=abc123"
        );
    }

    #[tokio::test]
    async fn test_skip_protocols_suppresses_fetches() {
        let client = Client::new();
        let formats = extract_wowza_formats(
            &client,
            "https://str.example.com/live/playlist.m3u8",
            &[PROTOCOL_HLS, PROTOCOL_SMIL],
        )
        .await
        .unwrap();
        assert!(formats.is_empty());
    }
}
