//! Raw documents as returned by the content source

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Document type holding blog posts
pub const POSTS: &str = "posts";

/// A document exactly as the CMS returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    #[serde(default)]
    pub uid: Option<String>,

    #[serde(rename = "type")]
    pub doc_type: String,

    #[serde(default)]
    pub first_publication_date: Option<String>,

    #[serde(default)]
    pub last_publication_date: Option<String>,

    /// Custom type fields
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Document {
    pub fn first_published(&self) -> Option<DateTime<FixedOffset>> {
        self.first_publication_date
            .as_deref()
            .and_then(parse_timestamp)
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default = "first_page")]
    pub page: u32,

    #[serde(default)]
    pub results_per_page: u32,

    #[serde(default)]
    pub total_results_size: u32,

    #[serde(default)]
    pub total_pages: u32,

    /// Cursor for the following page, absent on the last one
    #[serde(default)]
    pub next_page: Option<String>,

    #[serde(default)]
    pub results: Vec<Document>,
}

fn first_page() -> u32 {
    1
}

impl QueryResponse {
    pub fn empty() -> Self {
        Self {
            page: 1,
            results_per_page: 0,
            total_results_size: 0,
            total_pages: 0,
            next_page: None,
            results: Vec::new(),
        }
    }
}

/// Parse a CMS timestamp.
///
/// Accepts RFC 3339 (`2021-03-25T19:25:28+00:00`) and the compact offset form
/// the CMS emits (`2021-03-25T19:25:28+0000`).
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
}
