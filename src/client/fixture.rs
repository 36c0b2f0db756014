//! Offline content source backed by a JSON fixture file
//!
//! The file holds the published documents plus optional draft sets keyed by
//! preview token:
//!
//! ```json
//! {
//!   "page_size": 20,
//!   "documents": [ { "id": "...", "uid": "...", "type": "posts", ... } ],
//!   "previews": { "token-1": { "ref": "draft-1", "documents": [ ... ] } }
//! }
//! ```
//!
//! Draft documents replace published ones with the same id. Cursors are
//! `fixture:` followed by the percent-encoded query that produced them.

use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{
    ContentClient, Predicate, PreviewResolution, QueryOptions, ORDER_PUBLISHED_ASC,
    ORDER_PUBLISHED_DESC,
};
use crate::content::{Document, QueryResponse};
use crate::{Error, Result};

const CURSOR_PREFIX: &str = "fixture:";

/// Contents of a fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureSet {
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub documents: Vec<Document>,

    /// Draft content keyed by preview token
    #[serde(default)]
    pub previews: HashMap<String, FixturePreview>,
}

fn default_page_size() -> u32 {
    20
}

/// Draft documents visible under one ref
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturePreview {
    #[serde(rename = "ref")]
    pub reference: String,

    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Everything needed to recompute a page
#[derive(Debug, Serialize, Deserialize)]
struct CursorState {
    predicates: Vec<Predicate>,
    options: QueryOptions,
    page: u32,
}

/// In-process content client that serves a [`FixtureSet`]
pub struct FixtureClient {
    fixtures: FixtureSet,
}

impl FixtureClient {
    pub fn new(fixtures: FixtureSet) -> Self {
        Self { fixtures }
    }

    /// Load a fixture file from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read fixtures {:?}: {}", path, e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let fixtures: FixtureSet = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid fixtures: {}", e)))?;
        tracing::debug!(
            "Loaded {} fixture documents and {} previews",
            fixtures.documents.len(),
            fixtures.previews.len()
        );
        Ok(Self::new(fixtures))
    }

    /// Documents visible under a ref, draft overlays applied
    fn documents_at(&self, reference: Option<&str>) -> Result<Vec<Document>> {
        let mut docs = self.fixtures.documents.clone();
        let Some(reference) = reference else {
            return Ok(docs);
        };

        let preview = self
            .fixtures
            .previews
            .values()
            .find(|p| p.reference == reference)
            .ok_or_else(|| Error::Decode(format!("unknown ref {:?}", reference)))?;

        for draft in &preview.documents {
            match docs.iter_mut().find(|d| d.id == draft.id) {
                Some(existing) => *existing = draft.clone(),
                None => docs.push(draft.clone()),
            }
        }
        Ok(docs)
    }

    fn run(&self, predicates: &[Predicate], options: &QueryOptions, page: u32) -> Result<QueryResponse> {
        let mut docs = self.documents_at(options.ref_.as_deref())?;

        for predicate in predicates {
            let mut kept = Vec::with_capacity(docs.len());
            for doc in docs {
                if predicate_matches(predicate, &doc)? {
                    kept.push(doc);
                }
            }
            docs = kept;
        }

        match options.orderings.as_deref() {
            Some(ORDER_PUBLISHED_ASC) => docs.sort_by_key(|d| d.first_published()),
            None | Some(ORDER_PUBLISHED_DESC) => {
                docs.sort_by_key(|d| std::cmp::Reverse(d.first_published()))
            }
            Some(other) => return Err(Error::Decode(format!("unsupported orderings {:?}", other))),
        }

        if let Some(after) = &options.after {
            docs = match docs.iter().position(|d| &d.id == after) {
                Some(pos) => docs.split_off(pos + 1),
                None => Vec::new(),
            };
        }

        let page_size = options.page_size.unwrap_or(self.fixtures.page_size).max(1);
        let total = docs.len() as u32;
        let total_pages = total.div_ceil(page_size);
        let start = (page.max(1) as usize - 1).saturating_mul(page_size as usize);
        let results: Vec<Document> = docs.into_iter().skip(start).take(page_size as usize).collect();

        let next_page = if page < total_pages {
            Some(encode_cursor(&CursorState {
                predicates: predicates.to_vec(),
                options: options.clone(),
                page: page + 1,
            })?)
        } else {
            None
        };

        Ok(QueryResponse {
            page,
            results_per_page: page_size,
            total_results_size: total,
            total_pages,
            next_page,
            results,
        })
    }
}

fn predicate_matches(predicate: &Predicate, doc: &Document) -> Result<bool> {
    let Predicate::At { path, value } = predicate;
    match path.as_str() {
        "document.type" => Ok(&doc.doc_type == value),
        "document.id" => Ok(&doc.id == value),
        other => match uid_field_type(other) {
            Some(doc_type) => Ok(doc.doc_type == doc_type && doc.uid.as_deref() == Some(value.as_str())),
            None => Err(Error::Decode(format!("unsupported predicate path {:?}", other))),
        },
    }
}

/// `my.posts.uid` -> `posts`
fn uid_field_type(path: &str) -> Option<&str> {
    path.strip_prefix("my.")?.strip_suffix(".uid")
}

fn encode_cursor(state: &CursorState) -> Result<String> {
    let json = serde_json::to_string(state)?;
    Ok(format!(
        "{}{}",
        CURSOR_PREFIX,
        utf8_percent_encode(&json, NON_ALPHANUMERIC)
    ))
}

fn decode_cursor(cursor: &str) -> Result<CursorState> {
    let encoded = cursor
        .strip_prefix(CURSOR_PREFIX)
        .ok_or_else(|| Error::Decode(format!("not a fixture cursor: {:?}", cursor)))?;
    let json = percent_decode_str(encoded)
        .decode_utf8()
        .map_err(|e| Error::Decode(e.to_string()))?;
    Ok(serde_json::from_str(&json)?)
}

#[async_trait]
impl ContentClient for FixtureClient {
    async fn query_by_type(
        &self,
        doc_type: &str,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        let mut all = vec![Predicate::document_type(doc_type)];
        all.extend_from_slice(predicates);
        self.run(&all, options, 1)
    }

    async fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        options: &QueryOptions,
    ) -> Result<Option<Document>> {
        let predicate = Predicate::at(format!("my.{}.uid", doc_type), uid);
        let page = self.run(&[predicate], &options.clone().page_size(1), 1)?;
        Ok(page.results.into_iter().next())
    }

    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse> {
        let state = decode_cursor(cursor)?;
        self.run(&state.predicates, &state.options, state.page)
    }

    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<PreviewResolution>> {
        let Some(preview) = self.fixtures.previews.get(token) else {
            return Ok(None);
        };
        let docs = self.documents_at(Some(&preview.reference))?;
        Ok(docs
            .into_iter()
            .find(|d| d.id == document_id)
            .map(|document| PreviewResolution {
                reference: preview.reference.clone(),
                document,
            }))
    }
}
