//! Error types for the content pipeline

use thiserror::Error;

/// Errors raised while fetching, normalizing or materializing content
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A required field is missing from a CMS document
    #[error("Malformed document {id}: missing required field `{field}`")]
    MalformedContent { id: String, field: String },

    /// Preview token could not be resolved
    #[error("Invalid token: {0}")]
    Authorization(String),

    /// Network or service failure talking to the content source
    #[error("Content source unavailable: {0}")]
    TransientFetch(String),

    /// Response body did not have the expected shape
    #[error("Unexpected response from content source: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn malformed(id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MalformedContent {
            id: id.into(),
            field: field.into(),
        }
    }

    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::TransientFetch(err.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
