use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::client::{ChangeLog, ChangeLogElement};

const SHARE_TEXT_POINTER: &str =
    "/specificContent/com.linkedin.ugc.ShareContent/shareCommentary/text";
const POST_URL_PREFIX: &str = "https://www.linkedin.com/feed/update/";

/// The artifact written to the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPost {
    /// Post text rendered as HTML paragraphs.
    pub content: String,
    pub url: String,
    /// Naive UTC ISO-8601 timestamp.
    pub published_at: String,
    pub images: Vec<PostImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostImage {
    pub url: String,
    pub alt: String,
}

/// Pick the newest post creation in the change log.
///
/// Only `ugcPosts` entries with method `CREATE` count. The entry with the
/// strictly greatest `capturedAt` wins, so on a tie the earlier entry is kept
/// and entries without a positive timestamp are never chosen.
pub fn select_latest(changelog: &ChangeLog) -> Option<&ChangeLogElement> {
    let mut latest: Option<&ChangeLogElement> = None;
    let mut latest_ts = 0;

    for element in &changelog.elements {
        let is_post_creation = element.resource_name.as_deref() == Some("ugcPosts")
            && element.method.as_deref() == Some("CREATE");
        if is_post_creation && element.captured_at > latest_ts {
            latest_ts = element.captured_at;
            latest = Some(element);
        }
    }

    latest
}

/// Raw commentary text of a post entry, empty when absent.
pub fn post_text(element: &ChangeLogElement) -> &str {
    element
        .activity
        .pointer(SHARE_TEXT_POINTER)
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

/// Render plain post text as HTML.
///
/// Blank lines separate paragraphs; single newlines become `<br>`. Every
/// paragraph is followed by an empty spacer paragraph.
pub fn render_html(text: &str) -> String {
    text.trim()
        .split("\n\n")
        .map(|paragraph| format!("<p>{}</p><p>&nbsp;</p>", paragraph.replace('\n', "<br>")))
        .collect()
}

/// Public URL of the post.
pub fn post_url(element: &ChangeLogElement) -> String {
    let id = match &element.resource_id {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    };
    format!("{POST_URL_PREFIX}{id}")
}

/// Capture time of the entry, if the millisecond timestamp is representable.
pub fn captured_at(element: &ChangeLogElement) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(element.captured_at)
}

/// ISO-8601 without offset; fractional seconds only when non-zero.
pub fn format_published_at(at: DateTime<Utc>) -> String {
    let naive = at.naive_utc();
    if naive.nanosecond() == 0 {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Image file names in `dir` belonging to the post published on `date`.
///
/// A file belongs to the post when its name starts with the date
/// (`YYYY-MM-DD`) and its lowercased name ends with `.{extension}`. Names are
/// returned sorted. A missing directory yields no images.
pub fn matching_images(dir: &Path, date: &str, extension: &str) -> std::io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "Image directory missing, no images attached");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let suffix = format!(".{}", extension.trim_start_matches('.').to_lowercase());
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with(date) && name.to_lowercase().ends_with(&suffix) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Public URL for an image file.
///
/// With a base URL the name is appended to it verbatim; otherwise the URL is
/// the repository-relative path.
pub fn image_url(base_url: Option<&str>, images_dir: &Path, name: &str) -> String {
    match base_url {
        Some(base) => format!("{base}{name}"),
        None => {
            let dir = images_dir.to_string_lossy().replace('\\', "/");
            let dir = dir.trim_end_matches('/');
            if dir.is_empty() {
                name.to_string()
            } else {
                format!("{dir}/{name}")
            }
        }
    }
}

/// Serialize the artifact: 2-space indentation, non-ASCII kept as is.
pub fn to_artifact_json(post: &LatestPost) -> serde_json::Result<String> {
    serde_json::to_string_pretty(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn element(name: &str, method: &str, ts: i64, text: &str) -> ChangeLogElement {
        ChangeLogElement {
            resource_name: Some(name.to_string()),
            method: Some(method.to_string()),
            resource_id: json!(format!("urn:li:share:{ts}")),
            captured_at: ts,
            activity: json!({
                "specificContent": {
                    "com.linkedin.ugc.ShareContent": {
                        "shareCommentary": { "text": text }
                    }
                }
            }),
        }
    }

    #[test]
    fn test_select_latest_prefers_newest_creation() {
        let changelog = ChangeLog {
            elements: vec![
                element("ugcPosts", "CREATE", 100, "old"),
                element("ugcPosts", "CREATE", 300, "new"),
                element("ugcPosts", "UPDATE", 500, "edit"),
                element("socialActions", "CREATE", 900, "like"),
            ],
        };
        let latest = select_latest(&changelog).unwrap();
        assert_eq!(post_text(latest), "new");
    }

    #[test]
    fn test_select_latest_tie_keeps_first() {
        let changelog = ChangeLog {
            elements: vec![
                element("ugcPosts", "CREATE", 200, "first"),
                element("ugcPosts", "CREATE", 200, "second"),
            ],
        };
        assert_eq!(post_text(select_latest(&changelog).unwrap()), "first");
    }

    #[test]
    fn test_select_latest_none() {
        let changelog = ChangeLog {
            elements: vec![
                element("ugcPosts", "DELETE", 100, ""),
                element("ugcPosts", "CREATE", 0, "no timestamp"),
            ],
        };
        assert!(select_latest(&changelog).is_none());
        assert!(select_latest(&ChangeLog::default()).is_none());
    }

    #[test]
    fn test_post_text_missing_is_empty() {
        let mut e = element("ugcPosts", "CREATE", 1, "x");
        e.activity = json!({});
        assert_eq!(post_text(&e), "");
    }

    #[test]
    fn test_render_html() {
        assert_eq!(
            render_html("  Hello\nworld\n\nSecond paragraph \n"),
            "<p>Hello<br>world</p><p>&nbsp;</p><p>Second paragraph</p><p>&nbsp;</p>"
        );
    }

    #[test]
    fn test_render_html_empty() {
        assert_eq!(render_html(""), "<p></p><p>&nbsp;</p>");
    }

    #[test]
    fn test_post_url() {
        let e = element("ugcPosts", "CREATE", 7, "");
        assert_eq!(post_url(&e), "https://www.linkedin.com/feed/update/urn:li:share:7");

        let mut numeric = e.clone();
        numeric.resource_id = json!(42);
        assert_eq!(post_url(&numeric), "https://www.linkedin.com/feed/update/42");
    }

    #[test]
    fn test_format_published_at() {
        let whole = Utc.with_ymd_and_hms(2025, 3, 6, 9, 30, 0).unwrap();
        assert_eq!(format_published_at(whole), "2025-03-06T09:30:00");

        let fractional = DateTime::<Utc>::from_timestamp_millis(1_741_253_400_123).unwrap();
        assert_eq!(format_published_at(fractional), "2025-03-06T09:30:00.123000");
    }

    #[test]
    fn test_matching_images() {
        let dir = std::env::temp_dir().join("postsync_matching_images_test");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        for name in [
            "2025-03-06-b.jpeg",
            "2025-03-06-a.JPEG",
            "2025-03-06.png",
            "2025-03-07.jpeg",
            "notes.txt",
        ] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let names = matching_images(&dir, "2025-03-06", "jpeg").unwrap();
        assert_eq!(names, vec!["2025-03-06-a.JPEG", "2025-03-06-b.jpeg"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_matching_images_missing_dir() {
        let names =
            matching_images(Path::new("/tmp/postsync_no_such_images_dir"), "2025-03-06", "jpeg")
                .unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url(Some("https://cdn.example.com/images/"), Path::new("images"), "a.jpeg"),
            "https://cdn.example.com/images/a.jpeg"
        );
        assert_eq!(image_url(None, Path::new("images/"), "a.jpeg"), "images/a.jpeg");
    }

    #[test]
    fn test_artifact_json_layout() {
        let post = LatestPost {
            content: "<p>Café ☕</p><p>&nbsp;</p>".to_string(),
            url: "https://www.linkedin.com/feed/update/urn:li:share:1".to_string(),
            published_at: "2025-03-06T09:30:00".to_string(),
            images: vec![PostImage {
                url: "images/2025-03-06.jpeg".to_string(),
                alt: String::new(),
            }],
        };
        let expected = r#"{
  "content": "<p>Café ☕</p><p>&nbsp;</p>",
  "url": "https://www.linkedin.com/feed/update/urn:li:share:1",
  "published_at": "2025-03-06T09:30:00",
  "images": [
    {
      "url": "images/2025-03-06.jpeg",
      "alt": ""
    }
  ]
}"#;
        assert_eq!(to_artifact_json(&post).unwrap(), expected);
    }

    proptest! {
        #[test]
        fn prop_render_html_one_spacer_per_paragraph(text in "[a-z \n]{0,80}") {
            let html = render_html(&text);
            let paragraphs = text.trim().split("\n\n").count();
            prop_assert_eq!(html.matches("<p>&nbsp;</p>").count(), paragraphs);
            prop_assert!(!html.contains('\n'));
        }
    }
}
