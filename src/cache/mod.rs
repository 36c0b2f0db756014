//! Stale-while-revalidate page cache
//!
//! Each key moves through `Fresh -> Stale -> Regenerating -> Fresh`. A fresh
//! hit is served as-is. A stale hit is served immediately while one
//! background task regenerates the page; if that fails the old page stays
//! and the key is stale again. A miss is generated inline.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::Result;

/// A regeneration that has not reported back after this long is assumed lost
const REGENERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a cached page is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Regenerating,
}

#[derive(Debug, Clone)]
struct CachedPage<T> {
    value: T,
    stored_at: Instant,
    ttl: Duration,
    regenerating_since: Option<Instant>,
}

impl<T> CachedPage<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
            regenerating_since: None,
        }
    }

    fn freshness(&self) -> Freshness {
        if let Some(since) = self.regenerating_since {
            if since.elapsed() < REGENERATION_TIMEOUT {
                return Freshness::Regenerating;
            }
        }
        if self.stored_at.elapsed() >= self.ttl {
            Freshness::Stale
        } else {
            Freshness::Fresh
        }
    }
}

/// Materialized pages keyed by route
#[derive(Debug, Clone)]
pub struct PageCache<T> {
    pages: Arc<RwLock<HashMap<String, CachedPage<T>>>>,
}

impl<T> Default for PageCache<T> {
    fn default() -> Self {
        Self {
            pages: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<T> PageCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `key`, generating or regenerating it as its state requires.
    ///
    /// Only a miss can fail; once a page exists, failed regenerations are
    /// logged and the previous page keeps being served.
    pub async fn get_or_refresh<F, Fut>(&self, key: &str, ttl: Duration, generate: F) -> Result<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        {
            let mut pages = self.pages.write().await;
            if let Some(page) = pages.get_mut(key) {
                match page.freshness() {
                    Freshness::Fresh | Freshness::Regenerating => return Ok(page.value.clone()),
                    Freshness::Stale => {
                        page.regenerating_since = Some(Instant::now());
                        let stale = page.value.clone();
                        drop(pages);
                        self.spawn_regeneration(key.to_string(), ttl, generate);
                        return Ok(stale);
                    }
                }
            }
        }

        tracing::debug!("Cache miss for {}", key);
        let value = generate().await?;
        self.insert(key, value.clone(), ttl).await;
        Ok(value)
    }

    fn spawn_regeneration<F, Fut>(&self, key: String, ttl: Duration, generate: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let pages = self.pages.clone();
        tokio::spawn(async move {
            match generate().await {
                Ok(value) => {
                    pages.write().await.insert(key.clone(), CachedPage::new(value, ttl));
                    tracing::info!("Regenerated {}", key);
                }
                Err(e) => {
                    tracing::warn!("Regeneration of {} failed, serving stale page: {}", key, e);
                    if let Some(page) = pages.write().await.get_mut(&key) {
                        page.regenerating_since = None;
                    }
                }
            }
        });
    }

    /// Store a freshly generated page
    pub async fn insert(&self, key: &str, value: T, ttl: Duration) {
        self.pages
            .write()
            .await
            .insert(key.to_string(), CachedPage::new(value, ttl));
    }

    /// Current page for `key` without triggering any generation
    pub async fn peek(&self, key: &str) -> Option<T> {
        self.pages.read().await.get(key).map(|p| p.value.clone())
    }

    pub async fn freshness(&self, key: &str) -> Option<Freshness> {
        self.pages.read().await.get(key).map(CachedPage::freshness)
    }

    pub async fn invalidate(&self, key: &str) {
        self.pages.write().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.pages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOUR: Duration = Duration::from_secs(3600);

    async fn wait_until_settled(cache: &PageCache<String>, key: &str) {
        for _ in 0..200 {
            if cache.freshness(key).await != Some(Freshness::Regenerating) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("regeneration of {} never finished", key);
    }

    #[tokio::test]
    async fn test_miss_then_fresh_hit() {
        let cache = PageCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let value = cache
                .get_or_refresh("/", HOUR, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("v1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "v1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.freshness("/").await, Some(Freshness::Fresh));
    }

    #[tokio::test]
    async fn test_miss_failure_is_returned() {
        let cache: PageCache<String> = PageCache::new();
        let err = cache
            .get_or_refresh("/", HOUR, || async {
                Err(Error::TransientFetch("down".to_string()))
            })
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_stale_hit_serves_old_page_and_regenerates() {
        let cache = PageCache::new();
        cache.insert("/post/a", "v1".to_string(), Duration::ZERO).await;
        assert_eq!(cache.freshness("/post/a").await, Some(Freshness::Stale));

        let served = cache
            .get_or_refresh("/post/a", HOUR, || async { Ok("v2".to_string()) })
            .await
            .unwrap();
        assert_eq!(served, "v1");

        wait_until_settled(&cache, "/post/a").await;
        assert_eq!(cache.peek("/post/a").await.as_deref(), Some("v2"));
        assert_eq!(cache.freshness("/post/a").await, Some(Freshness::Fresh));
    }

    #[tokio::test]
    async fn test_failed_regeneration_keeps_stale_page() {
        let cache = PageCache::new();
        cache.insert("/", "v1".to_string(), Duration::ZERO).await;

        let served = cache
            .get_or_refresh("/", HOUR, || async {
                Err(Error::TransientFetch("timeout".to_string()))
            })
            .await
            .unwrap();
        assert_eq!(served, "v1");

        wait_until_settled(&cache, "/").await;
        assert_eq!(cache.peek("/").await.as_deref(), Some("v1"));
        assert_eq!(cache.freshness("/").await, Some(Freshness::Stale));
    }

    #[tokio::test]
    async fn test_single_regeneration_per_key() {
        let cache = PageCache::new();
        cache.insert("/", "v1".to_string(), Duration::ZERO).await;
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let calls = calls.clone();
            let served = cache
                .get_or_refresh("/", HOUR, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok("v2".to_string())
                })
                .await
                .unwrap();
            assert_eq!(served, "v1");
        }

        wait_until_settled(&cache, "/").await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.peek("/").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = PageCache::new();
        cache.insert("/", 1u32, HOUR).await;
        cache.invalidate("/").await;
        assert!(cache.peek("/").await.is_none());
        assert_eq!(cache.len().await, 0);
    }
}
