use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

/// Lenient integer coercion for API fields that arrive as either a JSON
/// number or a numeric string.
pub fn int_or_none(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// String coercion for identifier fields that arrive as either a string
/// or a number.
pub fn str_or_none(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses a textual duration like "1:23:45", "22:09" or "381" into seconds.
pub fn parse_duration(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }
    let mut total = 0u64;
    for part in &parts {
        let secs: f64 = part.trim().parse().ok()?;
        if secs < 0.0 {
            return None;
        }
        total = total * 60 + secs as u64;
    }
    Some(total)
}

/// Normalizes the timestamp formats seen across provider APIs to unix
/// seconds. Naive values are taken as UTC.
pub fn unified_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d.%m.%Y %H:%M:%S",
        "%d.%m.%Y %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d.%m.%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
        }
    }
    None
}

/// Resolves the common named HTML entities. Ampersand goes last so the
/// other entities survive a single pass.
pub fn unescape_html(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Looks up the content of the first matching `<meta>` tag, trying each
/// name in order and both attribute orders within a tag.
pub fn html_search_meta(html: &str, names: &[&str]) -> Option<String> {
    for name in names {
        let escaped = regex::escape(name);
        let patterns = [
            format!(
                r#"<meta[^>]+(?:name|property|itemprop)=["']{escaped}["'][^>]*content=["']([^"']*)["']"#
            ),
            format!(
                r#"<meta[^>]+content=["']([^"']*)["'][^>]*(?:name|property|itemprop)=["']{escaped}["']"#
            ),
        ];
        for pattern in &patterns {
            if let Ok(re) = Regex::new(pattern) {
                if let Some(m) = re.captures(html).and_then(|c| c.get(1)) {
                    let content = unescape_html(m.as_str());
                    let content = content.trim();
                    if !content.is_empty() {
                        return Some(content.to_string());
                    }
                }
            }
        }
    }
    None
}

/// Derives a container extension from the final URL path segment.
pub fn ext_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if !ext.is_empty() && ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_or_none() {
        assert_eq!(int_or_none(Some(&json!(381))), Some(381));
        assert_eq!(int_or_none(Some(&json!("381"))), Some(381));
        assert_eq!(int_or_none(Some(&json!(" 42 "))), Some(42));
        assert_eq!(int_or_none(Some(&json!(128000.0))), Some(128000));
        assert_eq!(int_or_none(Some(&json!("abc"))), None);
        assert_eq!(int_or_none(Some(&json!(null))), None);
        assert_eq!(int_or_none(None), None);
    }

    #[test]
    fn test_str_or_none() {
        assert_eq!(str_or_none(Some(&json!("92"))), Some("92".to_string()));
        assert_eq!(str_or_none(Some(&json!(92))), Some("92".to_string()));
        assert_eq!(str_or_none(Some(&json!(""))), None);
        assert_eq!(str_or_none(None), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("381"), Some(381));
        assert_eq!(parse_duration("22:09"), Some(1329));
        assert_eq!(parse_duration("1:02:03"), Some(3723));
        assert_eq!(parse_duration("00:22:09.970"), Some(1329));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
        assert_eq!(parse_duration("abc"), None);
    }

    #[test]
    fn test_unified_timestamp() {
        assert_eq!(unified_timestamp("2022-01-25 18:57:26"), Some(1643137046));
        assert_eq!(unified_timestamp("2022-01-25T18:57:26"), Some(1643137046));
        assert_eq!(
            unified_timestamp("2022-01-25T18:57:26+00:00"),
            Some(1643137046)
        );
        assert_eq!(unified_timestamp("2022-01-25"), Some(1643068800));
        assert_eq!(unified_timestamp("25.01.2022 18:57"), Some(1643137020));
        assert_eq!(unified_timestamp("not a date"), None);
        assert_eq!(unified_timestamp(""), None);
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(
            unescape_html("{&quot;audioUrl&quot;:&quot;a&amp;b&quot;}"),
            "{\"audioUrl\":\"a&b\"}"
        );
        assert_eq!(unescape_html("Bernhard, Henry; Brink, Nana"), "Bernhard, Henry; Brink, Nana");
    }

    #[test]
    fn test_html_search_meta() {
        let html = r#"
            <meta property="og:title" content="Versandhändler zahlt 5.000 Euro" />
            <meta content="A description." name="description">
            <meta name="og:image" content="">
        "#;
        assert_eq!(
            html_search_meta(html, &["og:title", "twitter:title"]),
            Some("Versandhändler zahlt 5.000 Euro".to_string())
        );
        assert_eq!(
            html_search_meta(html, &["description"]),
            Some("A description.".to_string())
        );
        // empty content does not satisfy the lookup
        assert_eq!(html_search_meta(html, &["og:image"]), None);
        assert_eq!(html_search_meta(html, &["twitter:image"]), None);
    }

    #[test]
    fn test_html_search_meta_prefers_first_name() {
        let html = r#"
            <meta name="twitter:title" content="Second">
            <meta property="og:title" content="First">
        "#;
        assert_eq!(
            html_search_meta(html, &["og:title", "twitter:title"]),
            Some("First".to_string())
        );
    }

    #[test]
    fn test_ext_from_url() {
        assert_eq!(
            ext_from_url("https://example.com/audio/8b1977f6.mp3"),
            Some("mp3".to_string())
        );
        assert_eq!(
            ext_from_url("https://example.com/v/clip.MP4?token=abc"),
            Some("mp4".to_string())
        );
        assert_eq!(ext_from_url("https://example.com/audio"), None);
        assert_eq!(ext_from_url("https://example.com/a.verylongext"), None);
    }
}
