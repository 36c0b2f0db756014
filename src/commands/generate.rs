//! Generate the build-time pages
//!
//! Writes the first list page to `index.json` and every static post to
//! `post/{uid}.json` under the public directory.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::materialize::{PageMaterializer, SingleOutcome};
use crate::Site;

/// Generate with the site's own content client
pub async fn run(site: &Site) -> Result<usize> {
    let materializer = site.materializer()?;
    run_with(site, &materializer).await
}

/// Generate using `materializer`; returns the number of files written
pub async fn run_with(site: &Site, materializer: &PageMaterializer) -> Result<usize> {
    let start = std::time::Instant::now();
    let public_dir = &site.public_dir;
    fs::create_dir_all(public_dir.join("post"))?;

    let list = materializer.materialize_list(None).await?;
    write_json(&public_dir.join("index.json"), &list)?;
    let mut written = 1;

    for uid in materializer.static_paths().await? {
        let Some(path) = post_path(public_dir, &uid) else {
            tracing::warn!("Skipping post with unusable uid {:?}", uid);
            continue;
        };

        match materializer.materialize_single(&uid, None).await? {
            SingleOutcome::Page(page) => {
                write_json(&path, &page)?;
                written += 1;
            }
            SingleOutcome::Redirect { .. } => {
                tracing::warn!("Post {} disappeared during generation", uid);
            }
        }
    }

    let duration = start.elapsed();
    tracing::info!("Generated {} files in {:.2}s", written, duration.as_secs_f64());

    Ok(written)
}

/// Output file for a post, `None` when the uid cannot be a file name
fn post_path(public_dir: &Path, uid: &str) -> Option<PathBuf> {
    let usable = !uid.is_empty()
        && uid != "."
        && uid != ".."
        && !uid.contains(['/', '\\']);
    usable.then(|| public_dir.join("post").join(format!("{}.json", uid)))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
    tracing::debug!("Wrote {:?}", path);
    Ok(())
}
