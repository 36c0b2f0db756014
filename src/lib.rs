//! spacetraveling: a blog served from a headless CMS
//!
//! Posts are fetched from a Prismic-style content API, normalized, enriched
//! with formatted dates and reading time, and served as page payloads that
//! are regenerated in the background once their revalidation window passes.
//! Preview sessions switch reads to draft content per client.

pub mod cache;
pub mod client;
pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod helpers;
pub mod materialize;
pub mod pagination;
pub mod preview;
pub mod server;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use client::{ContentClient, FixtureClient, PrismicClient};
use materialize::PageMaterializer;

/// A site rooted at a directory holding `_config.yml`
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
}

impl Site {
    /// Load the site in `base_dir`, falling back to defaults without a config file
    pub fn new<P: AsRef<Path>>(base_dir: P) -> anyhow::Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            let mut config = config::SiteConfig::default();
            config.apply_env();
            config
        };

        let public_dir = base_dir.join(&config.public_dir);

        Ok(Self {
            config,
            base_dir,
            public_dir,
        })
    }

    /// Content client for this site: the fixture file when one is
    /// configured, the CMS API otherwise
    pub fn client(&self) -> Result<Arc<dyn ContentClient>> {
        match &self.config.cms.fixtures {
            Some(path) => {
                let path = self.base_dir.join(path);
                tracing::info!("Serving content from fixtures {:?}", path);
                Ok(Arc::new(FixtureClient::load(path)?))
            }
            None => {
                tracing::debug!("Using content API at {}", self.config.cms.endpoint);
                Ok(Arc::new(PrismicClient::new(&self.config.cms)?))
            }
        }
    }

    pub fn materializer(&self) -> Result<PageMaterializer> {
        Ok(PageMaterializer::new(self.client()?, self.config.clone()))
    }

    /// Write the build-time pages to the public directory
    pub async fn generate(&self) -> anyhow::Result<usize> {
        commands::generate::run(self).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> anyhow::Result<()> {
        commands::clean::run(self)
    }
}
