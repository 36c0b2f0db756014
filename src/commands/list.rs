//! List posts

use anyhow::Result;

use crate::content::PostSummary;
use crate::materialize::PageMaterializer;
use crate::pagination::{LoadMore, PaginationController};
use crate::Site;

/// Print the first page of posts, or every post with `all`
pub async fn run(site: &Site, all: bool) -> Result<()> {
    let materializer = site.materializer()?;
    let (posts, more) = collect(&materializer, all).await?;

    println!("Posts ({}):", posts.len());
    for post in posts {
        let date = post
            .first_publication_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "----------".to_string());
        println!("  {} - {} [{}]", date, post.title, post.uid);
    }
    if more {
        println!("  ... more available, use --all");
    }

    Ok(())
}

/// Posts on the first page, or on every page with `all`, and whether more remain
pub async fn collect(materializer: &PageMaterializer, all: bool) -> Result<(Vec<PostSummary>, bool)> {
    let first = materializer.materialize_list(None).await?;
    let controller = PaginationController::from_page(&first);

    if all {
        let client = materializer.client();
        loop {
            match controller.load_more(client.as_ref()).await? {
                LoadMore::Appended(n) => tracing::debug!("Loaded {} more posts", n),
                LoadMore::Exhausted | LoadMore::InFlight => break,
            }
        }
    }

    Ok((controller.items(), controller.has_more()))
}
