//! Shared test doubles

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{ContentClient, FixtureClient, Predicate, PreviewResolution, QueryOptions};
use crate::content::{Document, QueryResponse};
use crate::{Error, Result};

pub(crate) fn post_doc(uid: &str, title: &str, published: &str) -> Document {
    Document {
        id: format!("id-{}", uid),
        uid: Some(uid.to_string()),
        doc_type: "posts".to_string(),
        first_publication_date: Some(published.to_string()),
        last_publication_date: Some(published.to_string()),
        data: json!({
            "title": title,
            "subtitle": format!("About {}", uid),
            "author": "Joseph Oliveira",
            "banner": {"url": format!("https://images.prismic.io/{}.png", uid)},
            "content": [
                {"heading": "Introdução", "body": [{"type": "paragraph", "text": "Lorem ipsum dolor sit amet", "spans": []}]},
                {"heading": null, "body": [{"type": "paragraph", "text": "consectetur adipiscing elit", "spans": []}]}
            ]
        }),
    }
}

/// Three published posts (`first` oldest, `third` newest) and one draft of `second`
pub(crate) fn fixture_json() -> String {
    let mut draft = post_doc("second", "Second post (draft)", "2021-02-10T12:00:00+0000");
    draft.last_publication_date = Some("2021-02-20T09:30:00+0000".to_string());

    json!({
        "page_size": 20,
        "documents": [
            post_doc("first", "First post", "2021-01-10T12:00:00+0000"),
            post_doc("second", "Second post", "2021-02-10T12:00:00+0000"),
            post_doc("third", "Third post", "2021-03-10T12:00:00+0000"),
        ],
        "previews": {
            "valid-token": {"ref": "draft-ref", "documents": [draft]}
        }
    })
    .to_string()
}

/// Wraps the fixture client, recording calls and injecting failures or latency
pub(crate) struct CountingClient {
    inner: FixtureClient,
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Option<Duration>,
    pub refs: Mutex<Vec<Option<String>>>,
}

impl CountingClient {
    pub fn new() -> Self {
        Self {
            inner: FixtureClient::from_json(&fixture_json()).unwrap(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: None,
            refs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn last_ref(&self) -> Option<Option<String>> {
        self.refs.lock().unwrap().last().cloned()
    }

    async fn enter(&self, reference: Option<&str>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.refs
            .lock()
            .unwrap()
            .push(reference.map(str::to_string));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::TransientFetch("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentClient for CountingClient {
    async fn query_by_type(
        &self,
        doc_type: &str,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        self.enter(options.ref_.as_deref()).await?;
        self.inner.query_by_type(doc_type, predicates, options).await
    }

    async fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        options: &QueryOptions,
    ) -> Result<Option<Document>> {
        self.enter(options.ref_.as_deref()).await?;
        self.inner.get_by_uid(doc_type, uid, options).await
    }

    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse> {
        self.enter(None).await?;
        self.inner.fetch_page(cursor).await
    }

    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<PreviewResolution>> {
        self.enter(None).await?;
        self.inner.resolve_preview(token, document_id).await
    }
}
