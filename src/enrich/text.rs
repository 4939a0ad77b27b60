use serde::{Deserialize, Serialize};

/// Headline length cap, in characters.
pub const HEADLINE_MAX: usize = 70;
/// Description length cap, in characters.
pub const DESC_MAX: usize = 160;

/// SEO fields added to the enriched artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seo {
    pub headline: String,
    pub description: String,
}

/// Reduce rendered post HTML to one line of plain text.
///
/// Tags become spaces, character references are decoded and whitespace runs
/// (including non-breaking spaces) collapse to a single space.
pub fn strip_html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' if !in_tag => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if in_tag => {}
            _ => text.push(c),
        }
    }
    collapse_whitespace(&decode_entities(&text))
}

fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&after[..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &after[end + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean up model output: markdown emphasis markers are dropped, em dashes
/// become hyphens, and surrounding quotes and whitespace are trimmed.
pub fn sanitize(s: &str) -> String {
    let cleaned = s.replace("**", "").replace("__", "").replace('\u{2014}', "-");
    cleaned.trim().trim_matches('"').trim().to_string()
}

/// Shorten `s` to at most `limit` characters, cutting at the last word
/// boundary and dropping trailing punctuation left by the cut.
pub fn soft_trim(s: &str, limit: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let cut: String = s.chars().take(limit).collect();
    let cut = match cut.rfind(' ') {
        Some(space) => &cut[..space],
        None => cut.as_str(),
    };
    cut.trim_end_matches([' ', ',', '.', ';', ':', '!', '?'])
        .to_string()
}

/// Pull `headline` and `description` out of a model reply.
///
/// The reply should be a JSON object, possibly wrapped in a code fence or
/// surrounded by prose. Anything unparseable yields empty fields. Both fields
/// are sanitized and trimmed to their caps.
pub fn parse_seo_reply(raw: &str) -> Seo {
    let body = strip_code_fence(raw.trim());
    let object = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .filter(serde_json::Value::is_object)
        .or_else(|| {
            let start = body.find('{')?;
            let end = body.rfind('}')?;
            if end <= start {
                return None;
            }
            serde_json::from_str::<serde_json::Value>(&body[start..=end])
                .ok()
                .filter(serde_json::Value::is_object)
        })
        .unwrap_or_default();

    let field = |name: &str| {
        object
            .get(name)
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    Seo {
        headline: finish_field(&field("headline"), HEADLINE_MAX),
        description: finish_field(&field("description"), DESC_MAX),
    }
}

fn finish_field(value: &str, limit: usize) -> String {
    collapse_whitespace(&soft_trim(&sanitize(value), limit))
}

fn strip_code_fence(s: &str) -> &str {
    if !s.starts_with("```") {
        return s;
    }
    let inner = s.trim_matches('`');
    match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => inner[4..].trim_start(),
        _ => inner,
    }
}

/// Replace every `{KEY}` in `template` with its value.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_strip_html_to_text() {
        assert_eq!(
            strip_html_to_text("<p>Big news!<br>Really.</p><p>&nbsp;</p><p>Fish &amp; chips &#8364;5</p>"),
            "Big news! Really. Fish & chips \u{20ac}5"
        );
    }

    #[test]
    fn test_unknown_entity_kept() {
        assert_eq!(strip_html_to_text("a &bogus; b & c"), "a &bogus; b & c");
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("  \"**Ship it** \u{2014} now\"  "), "Ship it - now");
        assert_eq!(sanitize(""), "");
    }

    #[test]
    fn test_soft_trim_cuts_at_word() {
        assert_eq!(soft_trim("short", 70), "short");
        assert_eq!(soft_trim("one two, three", 10), "one two");
        assert_eq!(soft_trim("abcdefghijkl", 5), "abcde");
    }

    #[test]
    fn test_parse_seo_reply_plain_json() {
        let seo = parse_seo_reply(r#"{"headline": "Hello", "description": "World"}"#);
        assert_eq!(
            seo,
            Seo {
                headline: "Hello".to_string(),
                description: "World".to_string()
            }
        );
    }

    #[test]
    fn test_parse_seo_reply_fenced_and_noisy() {
        let raw = "```json\n{\"headline\": \"**Bold** title\", \"description\": \"d\"}\n```";
        assert_eq!(parse_seo_reply(raw).headline, "Bold title");

        let raw = "Sure! Here you go: {\"headline\": \"h\", \"description\": \"d\"} Enjoy.";
        assert_eq!(parse_seo_reply(raw).description, "d");
    }

    #[test]
    fn test_parse_seo_reply_garbage_is_empty() {
        assert_eq!(parse_seo_reply("no json here"), Seo::default());
        assert_eq!(parse_seo_reply("[1, 2]"), Seo::default());
        assert_eq!(parse_seo_reply(r#"{"headline": 5}"#), Seo::default());
    }

    #[test]
    fn test_fill_placeholders() {
        assert_eq!(
            fill_placeholders("{CONTENT} in {MAX} chars, {OTHER}", &[("CONTENT", "x"), ("MAX", "70")]),
            "x in 70 chars, {OTHER}"
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("caf\u{e9}s", 4), "caf\u{e9}");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    proptest! {
        #[test]
        fn prop_seo_fields_respect_caps(headline in "[a-zA-Z ,.!]{0,200}", description in "[a-zA-Z ,.!]{0,400}") {
            let raw = serde_json::json!({ "headline": headline, "description": description }).to_string();
            let seo = parse_seo_reply(&raw);
            prop_assert!(seo.headline.chars().count() <= HEADLINE_MAX);
            prop_assert!(seo.description.chars().count() <= DESC_MAX);
        }
    }
}
