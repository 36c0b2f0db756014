//! Post models

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::RichText;

/// A blog post with its full body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// URL identifier
    pub uid: String,

    /// First publication date
    pub first_publication_date: Option<DateTime<FixedOffset>>,

    /// Last edit date
    pub last_publication_date: Option<DateTime<FixedOffset>>,

    /// Post title
    pub title: String,

    pub subtitle: String,

    pub author: String,

    /// Banner image
    pub banner_url: Option<String>,

    /// Body sections, in source order
    pub content: Vec<ContentBlock>,
}

impl Post {
    /// Whether the post was edited after it went live
    pub fn was_edited(&self) -> bool {
        match (self.first_publication_date, self.last_publication_date) {
            (Some(first), Some(last)) => last != first,
            (None, Some(_)) => true,
            _ => false,
        }
    }
}

/// The fields shown for a post in listings and prev/next links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub uid: String,
    pub first_publication_date: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// A section of a post body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub heading: Option<String>,
    pub body: RichText,
}
