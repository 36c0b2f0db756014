//! Content module - CMS documents, posts, and normalization

pub mod document;
mod normalize;
mod post;
mod rich_text;

pub use document::{Document, QueryResponse, POSTS};
pub use normalize::{normalize_post, normalize_summaries, normalize_summary};
pub use post::{ContentBlock, Post, PostSummary};
pub use rich_text::{RichText, RichTextNode, Span};
