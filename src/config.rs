//! Configuration file parser for `postsync.toml`.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown top-level sections are ignored by serde, but we log a warning when
//! the file contains potential typos. The LinkedIn token is normally injected
//! through `LINKEDIN_ACCESS_TOKEN`, which takes precedence over the file.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the LinkedIn bearer token.
pub const TOKEN_ENV_VAR: &str = "LINKEDIN_ACCESS_TOKEN";

/// Environment variable holding the API key for the enrichment model.
pub const ENRICH_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

/// Overrides `enrich.model`.
pub const ENRICH_MODEL_ENV_VAR: &str = "OPENAI_MODEL";

/// Overrides `enrich.profile`.
pub const ENRICH_PROFILE_ENV_VAR: &str = "LINKEDIN_PROMPT_PROFILE";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// Every section uses `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub git: GitConfig,
    pub linkedin: LinkedInConfig,
    pub artifact: ArtifactConfig,
    pub images: ImagesConfig,
    pub enrich: EnrichConfig,
}

/// Where and how commits are published.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote name to fetch from and push to.
    pub remote: String,

    /// Branch on the remote that receives the commits.
    pub branch: String,

    /// Total push attempts before giving up on remote contention.
    pub max_push_attempts: u32,

    /// Fixed wait between a rejected push and the next attempt.
    pub backoff_secs: u64,

    /// Committer name override. Unset means the repository's own identity.
    pub author_name: Option<String>,

    /// Committer email override.
    pub author_email: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            max_push_attempts: 5,
            backoff_secs: 5,
            author_name: None,
            author_email: None,
        }
    }
}

impl GitConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

/// LinkedIn change-log API settings.
///
/// Custom Debug impl masks `access_token` so the secret never reaches logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LinkedInConfig {
    /// Change-log endpoint. HTTPS is required except for localhost.
    pub api_base_url: String,

    /// Value sent in the `LinkedIn-Version` header.
    pub version: String,

    /// How far back the change-log query reaches.
    pub lookback_days: u32,

    /// `count` query parameter.
    pub page_size: u32,

    /// Bearer token (alternative to the LINKEDIN_ACCESS_TOKEN env var).
    pub access_token: Option<String>,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.linkedin.com/rest/memberChangeLogs".to_string(),
            version: "202312".to_string(),
            lookback_days: 3,
            page_size: 200,
            access_token: None,
        }
    }
}

impl std::fmt::Debug for LinkedInConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedInConfig")
            .field("api_base_url", &self.api_base_url)
            .field("version", &self.version)
            .field("lookback_days", &self.lookback_days)
            .field("page_size", &self.page_size)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl LinkedInConfig {
    /// Resolve the bearer token: environment first, then the config file.
    pub fn token(&self) -> Option<SecretString> {
        resolve_token(std::env::var(TOKEN_ENV_VAR).ok(), self.access_token.as_deref())
    }
}

fn resolve_token(from_env: Option<String>, from_file: Option<&str>) -> Option<SecretString> {
    from_env
        .filter(|t| !t.trim().is_empty())
        .or_else(|| from_file.map(str::to_string).filter(|t| !t.trim().is_empty()))
        .map(SecretString::from)
}

/// The JSON file holding the latest fetched post.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Path relative to the repository root.
    pub path: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("last_linkedin_post.json"),
        }
    }
}

/// The watched image directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Directory relative to the repository root.
    pub dir: PathBuf,

    /// File extension (without the dot) considered an image.
    pub extension: String,

    /// Public prefix prepended to image file names in the artifact.
    pub base_url: Option<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("images"),
            extension: "jpeg".to_string(),
            base_url: None,
        }
    }
}

/// Optional enrichment stage: SEO fields and image alt text from a language
/// model.
///
/// Custom Debug impl masks `api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    /// Responses endpoint. HTTPS is required except for localhost.
    pub api_base_url: String,

    pub model: String,

    /// API key (alternative to the OPENAI_API_KEY env var).
    pub api_key: Option<String>,

    /// Prompt file, relative to the repository root.
    pub prompts_path: PathBuf,

    /// `id` of the prompt set to use. Unset or unknown means the first set.
    pub profile: Option<String>,

    /// Enriched copy of the artifact, relative to the repository root.
    pub output_path: PathBuf,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1/responses".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            prompts_path: PathBuf::from("prompts.json"),
            profile: None,
            output_path: PathBuf::from("last_linkedin_post.enriched.json"),
        }
    }
}

impl std::fmt::Debug for EnrichConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichConfig")
            .field("api_base_url", &self.api_base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("prompts_path", &self.prompts_path)
            .field("profile", &self.profile)
            .field("output_path", &self.output_path)
            .finish()
    }
}

impl EnrichConfig {
    /// Resolve the API key: environment first, then the config file.
    pub fn api_key(&self) -> Option<SecretString> {
        resolve_token(std::env::var(ENRICH_KEY_ENV_VAR).ok(), self.api_key.as_deref())
    }

    /// Apply `OPENAI_MODEL` and `LINKEDIN_PROMPT_PROFILE` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENRICH_MODEL_ENV_VAR).ok(),
            std::env::var(ENRICH_PROFILE_ENV_VAR).ok(),
        );
    }

    fn apply_overrides(&mut self, model: Option<String>, profile: Option<String>) {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        if let Some(profile) = profile.filter(|p| !p.trim().is_empty()) {
            self.profile = Some(profile.trim().to_string());
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_SECTIONS: [&'static str; 5] = ["git", "linkedin", "artifact", "images", "enrich"];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown sections → accepted, logged as warning
    /// - Values that make publishing impossible → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text. Empty text yields the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_SECTIONS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        tracing::info!(
            remote = %config.git.remote,
            branch = %config.git.branch,
            artifact = %config.artifact.path.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.git.max_push_attempts == 0 {
            return Err(ConfigError::Invalid(
                "git.max_push_attempts must be at least 1".to_string(),
            ));
        }
        if self.git.remote.trim().is_empty() || self.git.branch.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "git.remote and git.branch must not be empty".to_string(),
            ));
        }
        if self.images.extension.trim().is_empty() || self.images.extension.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "images.extension '{}' is not a file extension",
                self.images.extension
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
