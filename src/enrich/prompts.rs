use serde::Deserialize;
use std::path::Path;

use super::EnrichError;

/// One named set of prompts from the prompt file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptSet {
    #[serde(default)]
    pub id: Option<String>,
    pub seo_system: String,
    /// Placeholders: `{CONTENT}`, `{HEADLINE_MAX}`, `{TITLE_MAX}`, `{DESC_MAX}`.
    pub seo_user: String,
    pub alt_system: String,
    /// Placeholder: `{CONTEXT}`.
    pub alt_user: String,
}

#[derive(Debug, Deserialize)]
struct PromptFile {
    #[serde(default)]
    linkedin_post_enrichment: Vec<serde_json::Value>,
}

/// Load the prompt file and pick the set named `profile`.
///
/// An unknown profile falls back to the first set with a warning. A missing
/// file, an empty `linkedin_post_enrichment` array or a chosen set lacking
/// one of the four prompts is an error.
pub fn load_prompt_set(path: &Path, profile: Option<&str>) -> Result<PromptSet, EnrichError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EnrichError::Prompts(format!("{}: {e}", path.display())))?;
    parse_prompt_set(&content, profile)
}

pub(crate) fn parse_prompt_set(content: &str, profile: Option<&str>) -> Result<PromptSet, EnrichError> {
    let file: PromptFile = serde_json::from_str(content)
        .map_err(|e| EnrichError::Prompts(format!("invalid prompt file: {e}")))?;
    if file.linkedin_post_enrichment.is_empty() {
        return Err(EnrichError::Prompts(
            "prompt file must contain a non-empty 'linkedin_post_enrichment' array".to_string(),
        ));
    }

    let wanted = profile.map(str::trim).filter(|p| !p.is_empty());
    let by_id = wanted.and_then(|id| {
        file.linkedin_post_enrichment
            .iter()
            .find(|set| set.get("id").and_then(serde_json::Value::as_str) == Some(id))
    });
    if let (Some(id), None) = (wanted, by_id) {
        tracing::warn!(profile = %id, "Prompt profile not found, using the first set");
    }

    let chosen = by_id
        .or_else(|| file.linkedin_post_enrichment.first())
        .cloned()
        .unwrap_or_default();
    serde_json::from_value(chosen)
        .map_err(|e| EnrichError::Prompts(format!("incomplete prompt set: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROMPTS: &str = r#"{
        "linkedin_post_enrichment": [
            { "id": "default", "seo_system": "s1", "seo_user": "u1 {CONTENT}", "alt_system": "a1", "alt_user": "au1 {CONTEXT}" },
            { "id": "short", "seo_system": "s2", "seo_user": "u2", "alt_system": "a2", "alt_user": "au2" }
        ]
    }"#;

    #[test]
    fn test_first_set_without_profile() {
        let set = parse_prompt_set(PROMPTS, None).unwrap();
        assert_eq!(set.id.as_deref(), Some("default"));
        assert_eq!(set.seo_user, "u1 {CONTENT}");
    }

    #[test]
    fn test_profile_selects_by_id() {
        let set = parse_prompt_set(PROMPTS, Some("short")).unwrap();
        assert_eq!(set.seo_system, "s2");
    }

    #[test]
    fn test_unknown_profile_falls_back_to_first() {
        let set = parse_prompt_set(PROMPTS, Some("nope")).unwrap();
        assert_eq!(set.seo_system, "s1");
    }

    #[test]
    fn test_empty_array_rejected() {
        let err = parse_prompt_set(r#"{"linkedin_post_enrichment": []}"#, None).unwrap_err();
        assert!(matches!(err, EnrichError::Prompts(_)));
        assert!(parse_prompt_set("{}", None).is_err());
    }

    #[test]
    fn test_missing_key_rejected() {
        let content = r#"{"linkedin_post_enrichment": [{"seo_system": "s", "seo_user": "u", "alt_system": "a"}]}"#;
        let err = parse_prompt_set(content, None).unwrap_err();
        assert!(err.to_string().contains("alt_user"), "got {err}");
    }

    #[test]
    fn test_missing_file() {
        let err = load_prompt_set(Path::new("/tmp/postsync_no_such_prompts.json"), None).unwrap_err();
        assert!(matches!(err, EnrichError::Prompts(_)));
    }
}
