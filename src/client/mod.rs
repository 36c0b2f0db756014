//! Content source access
//!
//! [`ContentClient`] is the only way the rest of the crate talks to the CMS.
//! Every call takes the ref to read from explicitly; `None` means the
//! published (master) ref.

mod fixture;
mod prismic;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::content::{Document, QueryResponse};
use crate::Result;

pub use fixture::{FixtureClient, FixturePreview, FixtureSet};
pub use prismic::PrismicClient;

/// Oldest first
pub const ORDER_PUBLISHED_ASC: &str = "[document.first_publication_date]";
/// Newest first
pub const ORDER_PUBLISHED_DESC: &str = "[document.first_publication_date desc]";

/// A query filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// Field at `path` equals `value`
    At { path: String, value: String },
}

impl Predicate {
    pub fn at(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self::At {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Filter on document type
    pub fn document_type(doc_type: &str) -> Self {
        Self::at("document.type", doc_type)
    }

    /// Query-language form, e.g. `[at(document.type,"posts")]`
    pub fn to_query(&self) -> String {
        match self {
            Self::At { path, value } => {
                format!(r#"[at({},"{}")]"#, path, value.replace('"', "\\\""))
            }
        }
    }
}

/// Options recognized by every query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Content version to read; `None` reads the published ref
    #[serde(rename = "ref")]
    pub ref_: Option<String>,
    pub page_size: Option<u32>,
    pub orderings: Option<String>,
    /// Only return documents ordered after this document id
    pub after: Option<String>,
}

impl QueryOptions {
    pub fn with_ref(mut self, reference: Option<&str>) -> Self {
        self.ref_ = reference.map(str::to_string);
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn orderings(mut self, orderings: &str) -> Self {
        self.orderings = Some(orderings.to_string());
        self
    }

    pub fn after(mut self, document_id: &str) -> Self {
        self.after = Some(document_id.to_string());
        self
    }
}

/// A preview token that resolved to a draft
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewResolution {
    /// Draft ref to pass to subsequent queries
    pub reference: String,
    /// The document being previewed
    pub document: Document,
}

/// Capability to read documents from the content source
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// Search documents of `doc_type`, narrowed by extra predicates
    async fn query_by_type(
        &self,
        doc_type: &str,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse>;

    /// Fetch a single document by its UID
    async fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        options: &QueryOptions,
    ) -> Result<Option<Document>>;

    /// Fetch the page a previous response pointed to with `next_page`
    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse>;

    /// Resolve a preview token for a document. `Ok(None)` means the token
    /// is invalid or expired.
    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<PreviewResolution>>;
}
