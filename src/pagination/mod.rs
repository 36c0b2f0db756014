//! Incremental "load more" state for the post list
//!
//! A [`PaginationController`] holds the posts shown so far and the cursor of
//! the next page. `load_more` swaps in the grown list and the new cursor in a
//! single write once the whole page has been fetched and normalized, so a
//! failed or cancelled load leaves the state untouched.

use serde::Serialize;
use std::sync::{PoisonError, RwLock};
use tokio::sync::Mutex;

use crate::client::ContentClient;
use crate::content::{normalize_summaries, PostSummary};
use crate::materialize::ListPage;
use crate::Result;

/// Items and cursor at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub items: Vec<PostSummary>,
    pub next_cursor: Option<String>,
}

/// Outcome of a `load_more` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMore {
    /// This many posts were appended
    Appended(usize),
    /// There is no further page; nothing was fetched
    Exhausted,
    /// Another load is still running; nothing was fetched
    InFlight,
}

/// Owner of the client-visible list of posts
#[derive(Debug, Default)]
pub struct PaginationController {
    state: RwLock<PaginationState>,
    in_flight: Mutex<()>,
}

impl PaginationController {
    pub fn new(items: Vec<PostSummary>, next_cursor: Option<String>) -> Self {
        Self {
            state: RwLock::new(PaginationState { items, next_cursor }),
            in_flight: Mutex::new(()),
        }
    }

    /// Start from a materialized list page
    pub fn from_page(page: &ListPage) -> Self {
        let items = page.results.iter().map(|entry| entry.post.clone()).collect();
        Self::new(items, page.next_cursor.clone())
    }

    /// Fetch the page at the current cursor and append it.
    ///
    /// At most one load runs at a time; a call made while another is pending
    /// returns [`LoadMore::InFlight`] without fetching.
    pub async fn load_more(&self, client: &dyn ContentClient) -> Result<LoadMore> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("load_more already in flight");
            return Ok(LoadMore::InFlight);
        };

        let Some(cursor) = self.cursor() else {
            return Ok(LoadMore::Exhausted);
        };

        let page = client.fetch_page(&cursor).await?;
        let fetched = normalize_summaries(&page.results)?;
        let appended = fetched.len();

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.items.extend(fetched);
        state.next_cursor = page.next_page;
        tracing::debug!(
            "Appended {} posts, {} total, more: {}",
            appended,
            state.items.len(),
            state.next_cursor.is_some()
        );

        Ok(LoadMore::Appended(appended))
    }

    pub fn items(&self) -> Vec<PostSummary> {
        self.read().items.clone()
    }

    pub fn cursor(&self) -> Option<String> {
        self.read().next_cursor.clone()
    }

    pub fn has_more(&self) -> bool {
        self.read().next_cursor.is_some()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    /// Consistent copy of items and cursor
    pub fn snapshot(&self) -> PaginationState {
        self.read().clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, PaginationState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}
