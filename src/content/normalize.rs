//! Mapping of raw CMS documents into posts

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::document::parse_timestamp;
use super::{ContentBlock, Document, Post, PostSummary, RichText};
use crate::{Error, Result};

/// Build a full [`Post`] from a document.
///
/// Fails only when `uid` or `title` is missing; every other field degrades to
/// an empty value.
pub fn normalize_post(doc: &Document) -> Result<Post> {
    let (uid, title) = required_fields(doc)?;
    let data = &doc.data;

    Ok(Post {
        uid,
        first_publication_date: timestamp(doc, doc.first_publication_date.as_deref()),
        last_publication_date: timestamp(doc, doc.last_publication_date.as_deref()),
        title,
        subtitle: text_field(data, "subtitle").unwrap_or_default(),
        author: text_field(data, "author").unwrap_or_default(),
        banner_url: data
            .get("banner")
            .and_then(|b| b.get("url"))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string),
        content: content_blocks(doc)?,
    })
}

/// Build a [`PostSummary`] from a document
pub fn normalize_summary(doc: &Document) -> Result<PostSummary> {
    let (uid, title) = required_fields(doc)?;
    let data = &doc.data;

    Ok(PostSummary {
        uid,
        first_publication_date: timestamp(doc, doc.first_publication_date.as_deref()),
        title,
        subtitle: text_field(data, "subtitle").unwrap_or_default(),
        author: text_field(data, "author").unwrap_or_default(),
    })
}

/// Normalize every document of a result page, failing on the first malformed one
pub fn normalize_summaries(docs: &[Document]) -> Result<Vec<PostSummary>> {
    docs.iter().map(normalize_summary).collect()
}

fn required_fields(doc: &Document) -> Result<(String, String)> {
    let uid = doc
        .uid
        .as_deref()
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| Error::malformed(&doc.id, "uid"))?
        .to_string();
    let title = text_field(&doc.data, "title").ok_or_else(|| Error::malformed(&doc.id, "title"))?;
    Ok((uid, title))
}

/// Read a text field stored either as a plain string or as rich text
fn text_field(data: &Value, key: &str) -> Option<String> {
    let text = match data.get(key)? {
        Value::String(s) => s.trim().to_string(),
        value @ Value::Array(_) => serde_json::from_value::<RichText>(value.clone())
            .ok()?
            .as_text()
            .trim()
            .to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn timestamp(doc: &Document, value: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let value = value?;
    let parsed = parse_timestamp(value);
    if parsed.is_none() {
        tracing::warn!("Ignoring unparsable date {:?} on document {}", value, doc.id);
    }
    parsed
}

fn content_blocks(doc: &Document) -> Result<Vec<ContentBlock>> {
    let Some(blocks) = doc.data.get("content").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    blocks
        .iter()
        .map(|block| {
            let body = match block.get("body") {
                None | Some(Value::Null) => RichText::default(),
                Some(value) => serde_json::from_value(value.clone())
                    .map_err(|_| Error::malformed(&doc.id, "content.body"))?,
            };
            Ok(ContentBlock {
                heading: text_field(block, "heading"),
                body,
            })
        })
        .collect()
}
