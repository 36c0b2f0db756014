//! Initialize a new site

use anyhow::Result;
use serde_json::json;
use std::fs;
use std::path::Path;

use crate::config::{ACCESS_TOKEN_ENV, PREVIEW_SECRET_ENV};

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir)?;

    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }

    let config_content = format!(
        r#"# spacetraveling configuration

# Site
title: spacetraveling
language: pt-BR
public_dir: public

# Content source
cms:
  endpoint: https://spacetraveling.cdn.prismic.io/api/v2
  # Private repositories need a token; {} overrides this value
  access_token:
  timeout_seconds: 10
  # Serve content from a local file instead of the API
  # fixtures: fixtures.json

# Pagination
pagination:
  page_size: 20
  static_paths: 10

# Seconds a page is served before it is regenerated
revalidate:
  list_seconds: 3600
  post_seconds: 1800

# Preview sessions
preview:
  cookie_name: io.prismic.preview
  max_age_seconds: 3600
  # Signs the preview cookie; at least 64 characters. {} overrides this value
  # secret:

# Date / Time format
date_format: d MMM yyyy
edit_format: "d MMM yyyy, 'às' HH:mm"
"#,
        ACCESS_TOKEN_ENV,
        PREVIEW_SECRET_ENV
    );
    fs::write(&config_path, config_content)?;

    // Sample content for offline use
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S+0000").to_string();
    let fixtures = json!({
        "page_size": 20,
        "documents": [{
            "id": "hello-world",
            "uid": "hello-world",
            "type": "posts",
            "first_publication_date": now,
            "last_publication_date": now,
            "data": {
                "title": "Hello World",
                "subtitle": "Your very first post",
                "author": "spacetraveling",
                "banner": { "url": null },
                "content": [{
                    "heading": "Quick Start",
                    "body": [
                        { "type": "paragraph", "text": "Run `spacetraveling server` to serve this post.", "spans": [] }
                    ]
                }]
            }
        }],
        "previews": {}
    });
    fs::write(
        target_dir.join("fixtures.json"),
        serde_json::to_string_pretty(&fixtures)?,
    )?;

    Ok(())
}
