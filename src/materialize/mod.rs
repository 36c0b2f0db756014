//! Page materialization
//!
//! Turns CMS documents into render-ready page payloads: the paginated post
//! list and single post pages with formatted dates, reading time, rendered
//! sections and prev/next links. Published pages are served through a
//! stale-while-revalidate [`PageCache`]; preview requests always go to the
//! content source.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::PageCache;
use crate::client::{ContentClient, QueryOptions, ORDER_PUBLISHED_ASC, ORDER_PUBLISHED_DESC};
use crate::config::SiteConfig;
use crate::content::{
    normalize_post, normalize_summaries, normalize_summary, Document, Post, PostSummary, POSTS,
};
use crate::helpers::{estimate_reading_time, format_date};
use crate::Result;

/// How long a materialized page may be served before it is regenerated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidationPolicy {
    pub ttl_seconds: u64,
}

impl RevalidationPolicy {
    pub fn new(ttl_seconds: u64) -> Self {
        Self { ttl_seconds }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// A post card on the list page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEntry {
    #[serde(flatten)]
    pub post: PostSummary,
    pub published_on: Option<String>,
}

/// One page of the post list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    pub results: Vec<ListEntry>,
    pub next_cursor: Option<String>,
    pub revalidate: u64,
    pub generated_at: DateTime<Utc>,
}

/// A body section with its HTML rendered
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: Option<String>,
    pub html: String,
}

/// Everything a single post page shows
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePage {
    pub post: Post,
    pub first_published_on: Option<String>,
    /// Only set when the post changed after it was first published
    pub edited_on: Option<String>,
    pub reading_time_minutes: u32,
    pub sections: Vec<Section>,
    /// Next newer post
    pub next_post: Option<PostSummary>,
    /// Next older post
    pub prev_post: Option<PostSummary>,
    pub preview: bool,
    pub revalidate: u64,
    pub generated_at: DateTime<Utc>,
}

/// Result of asking for a single post
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SingleOutcome {
    Page(Box<SinglePage>),
    /// The uid does not resolve; send the reader elsewhere
    Redirect { destination: String },
}

/// Builds and caches page payloads
#[derive(Clone)]
pub struct PageMaterializer {
    client: Arc<dyn ContentClient>,
    config: Arc<SiteConfig>,
    lists: PageCache<ListPage>,
    singles: PageCache<SingleOutcome>,
}

impl PageMaterializer {
    pub fn new(client: Arc<dyn ContentClient>, config: SiteConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            lists: PageCache::new(),
            singles: PageCache::new(),
        }
    }

    pub fn client(&self) -> Arc<dyn ContentClient> {
        self.client.clone()
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn list_policy(&self) -> RevalidationPolicy {
        RevalidationPolicy::new(self.config.revalidate.list_seconds)
    }

    pub fn post_policy(&self) -> RevalidationPolicy {
        RevalidationPolicy::new(self.config.revalidate.post_seconds)
    }

    /// Build a list page from the content source.
    ///
    /// Without a cursor this is the first page in the source's default
    /// order; with one it is the page the cursor points to.
    pub async fn materialize_list(&self, cursor: Option<&str>) -> Result<ListPage> {
        let response = match cursor {
            Some(cursor) => self.client.fetch_page(cursor).await?,
            None => {
                let options = QueryOptions::default().page_size(self.config.pagination.page_size);
                self.client.query_by_type(POSTS, &[], &options).await?
            }
        };

        let results = normalize_summaries(&response.results)?
            .into_iter()
            .map(|post| ListEntry {
                published_on: self.format_published(post.first_publication_date),
                post,
            })
            .collect::<Vec<_>>();
        tracing::debug!("Materialized list page with {} posts", results.len());

        Ok(ListPage {
            results,
            next_cursor: response.next_page,
            revalidate: self.list_policy().ttl_seconds,
            generated_at: Utc::now(),
        })
    }

    /// Build the page for `uid` as seen under `active_ref`
    pub async fn materialize_single(
        &self,
        uid: &str,
        active_ref: Option<&str>,
    ) -> Result<SingleOutcome> {
        let options = QueryOptions::default().with_ref(active_ref);
        let Some(document) = self.client.get_by_uid(POSTS, uid, &options).await? else {
            tracing::debug!("No post with uid {:?}, redirecting", uid);
            return Ok(SingleOutcome::Redirect {
                destination: "/".to_string(),
            });
        };

        let post = normalize_post(&document)?;
        let next_post = self.neighbor(&document, ORDER_PUBLISHED_ASC, active_ref).await?;
        let prev_post = self.neighbor(&document, ORDER_PUBLISHED_DESC, active_ref).await?;

        let edited_on = if post.was_edited() {
            post.last_publication_date
                .map(|date| format_date(&date, &self.config.edit_format, &self.config.language))
        } else {
            None
        };
        let sections = post
            .content
            .iter()
            .map(|block| Section {
                heading: block.heading.clone(),
                html: block.body.as_html(),
            })
            .collect();

        Ok(SingleOutcome::Page(Box::new(SinglePage {
            first_published_on: self.format_published(post.first_publication_date),
            edited_on,
            reading_time_minutes: estimate_reading_time(&post.content),
            sections,
            next_post,
            prev_post,
            preview: active_ref.is_some(),
            revalidate: self.post_policy().ttl_seconds,
            generated_at: Utc::now(),
            post,
        })))
    }

    /// The post adjacent to `document` in `orderings`
    async fn neighbor(
        &self,
        document: &Document,
        orderings: &str,
        active_ref: Option<&str>,
    ) -> Result<Option<PostSummary>> {
        let options = QueryOptions::default()
            .with_ref(active_ref)
            .page_size(1)
            .orderings(orderings)
            .after(&document.id);
        let response = self.client.query_by_type(POSTS, &[], &options).await?;

        let Some(neighbor) = response.results.first() else {
            return Ok(None);
        };
        match normalize_summary(neighbor) {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                tracing::warn!("Skipping neighbor of {}: {}", document.id, e);
                Ok(None)
            }
        }
    }

    /// Uids of the posts rendered ahead of time
    pub async fn static_paths(&self) -> Result<Vec<String>> {
        let options = QueryOptions::default().page_size(self.config.pagination.static_paths);
        let response = self.client.query_by_type(POSTS, &[], &options).await?;
        Ok(response.results.into_iter().filter_map(|doc| doc.uid).collect())
    }

    /// List page; only the first page is cached, cursor pages go to the source
    pub async fn list(&self, cursor: Option<&str>) -> Result<ListPage> {
        if cursor.is_some() {
            return self.materialize_list(cursor).await;
        }

        let this = self.clone();
        self.lists
            .get_or_refresh(LIST_KEY, self.list_policy().ttl(), move || async move {
                this.materialize_list(None).await
            })
            .await
    }

    /// Single post page; cached unless a preview ref is active.
    ///
    /// Redirects are not kept, so unknown uids never occupy the cache.
    pub async fn single(&self, uid: &str, active_ref: Option<&str>) -> Result<SingleOutcome> {
        if active_ref.is_some() {
            return self.materialize_single(uid, active_ref).await;
        }

        let key = post_key(uid);
        let this = self.clone();
        let owned_uid = uid.to_string();
        let outcome = self
            .singles
            .get_or_refresh(&key, self.post_policy().ttl(), move || async move {
                this.materialize_single(&owned_uid, None).await
            })
            .await?;
        if matches!(outcome, SingleOutcome::Redirect { .. }) {
            self.singles.invalidate(&key).await;
        }
        Ok(outcome)
    }

    /// Warm the caches with the list page and every static post.
    ///
    /// Returns how many pages were rendered; failures are logged and skipped.
    pub async fn prerender(&self) -> usize {
        let mut rendered = 0;

        match self.materialize_list(None).await {
            Ok(page) => {
                self.lists.insert(LIST_KEY, page, self.list_policy().ttl()).await;
                rendered += 1;
            }
            Err(e) => tracing::warn!("Failed to prerender list page: {}", e),
        }

        let uids = match self.static_paths().await {
            Ok(uids) => uids,
            Err(e) => {
                tracing::warn!("Failed to fetch static paths: {}", e);
                return rendered;
            }
        };

        for uid in uids {
            match self.materialize_single(&uid, None).await {
                Ok(SingleOutcome::Redirect { .. }) => {
                    tracing::warn!("Post {} disappeared during prerender", uid);
                }
                Ok(outcome) => {
                    self.singles
                        .insert(&post_key(&uid), outcome, self.post_policy().ttl())
                        .await;
                    rendered += 1;
                }
                Err(e) => tracing::warn!("Failed to prerender post {}: {}", uid, e),
            }
        }

        tracing::info!("Prerendered {} pages", rendered);
        rendered
    }

    fn format_published(&self, date: Option<DateTime<FixedOffset>>) -> Option<String> {
        date.map(|d| format_date(&d, &self.config.date_format, &self.config.language))
    }
}

const LIST_KEY: &str = "/";

fn post_key(uid: &str) -> String {
    format!("/post/{}", uid)
}
