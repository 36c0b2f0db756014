//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable that overrides `cms.access_token`
pub const ACCESS_TOKEN_ENV: &str = "PRISMIC_ACCESS_TOKEN";

/// Environment variable that overrides `preview.secret`
pub const PREVIEW_SECRET_ENV: &str = "SPACETRAVELING_PREVIEW_SECRET";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub language: String,

    // Directory
    pub public_dir: String,

    // Content source
    pub cms: CmsConfig,

    // Pagination
    pub pagination: PaginationConfig,

    // Revalidation
    pub revalidate: RevalidateConfig,

    // Preview
    pub preview: PreviewConfig,

    // Date / Time format (date-fns style tokens)
    pub date_format: String,
    pub edit_format: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "spacetraveling".to_string(),
            language: "pt-BR".to_string(),

            public_dir: "public".to_string(),

            cms: CmsConfig::default(),
            pagination: PaginationConfig::default(),
            revalidate: RevalidateConfig::default(),
            preview: PreviewConfig::default(),

            date_format: "d MMM yyyy".to_string(),
            edit_format: "d MMM yyyy, 'às' HH:mm".to_string(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: SiteConfig = serde_yaml::from_str(&content)?;
        config.apply_env();
        Ok(config)
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                tracing::debug!("Using access token from {}", ACCESS_TOKEN_ENV);
                self.cms.access_token = Some(token);
            }
        }
        if let Ok(secret) = std::env::var(PREVIEW_SECRET_ENV) {
            if !secret.is_empty() {
                tracing::debug!("Using preview secret from {}", PREVIEW_SECRET_ENV);
                self.preview.secret = Some(secret);
            }
        }
    }

    /// Serialize to YAML for `init`
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Remote content source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
    /// Fixture file; when set, content is served from it instead of the endpoint
    pub fixtures: Option<String>,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://spacetraveling.cdn.prismic.io/api/v2".to_string(),
            access_token: None,
            timeout_seconds: 10,
            fixtures: None,
        }
    }
}

impl CmsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// List pagination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub page_size: u32,
    /// Number of posts pre-generated at build time
    pub static_paths: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            static_paths: 10,
        }
    }
}

/// Time-to-live of materialized pages, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevalidateConfig {
    pub list_seconds: u64,
    pub post_seconds: u64,
}

impl Default for RevalidateConfig {
    fn default() -> Self {
        Self {
            list_seconds: 60 * 60,
            post_seconds: 60 * 30,
        }
    }
}

/// Preview cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub cookie_name: String,
    pub max_age_seconds: i64,
    /// Cookie signing secret, at least 64 bytes. Without one a random key is
    /// used and sessions end when the server restarts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            cookie_name: "io.prismic.preview".to_string(),
            max_age_seconds: 60 * 60,
            secret: None,
        }
    }
}
