//! Preview sessions
//!
//! A preview session makes content reads resolve against a draft ref instead
//! of the published one. The session lives in a signed per-client cookie;
//! handlers decode it into a [`PreviewContext`] and pass
//! [`PreviewContext::active_ref`] into every content call. Cookies that fail
//! the signature check are ignored, so only refs resolved by
//! [`PreviewSessionManager::enter`] are ever used.

use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::client::ContentClient;
use crate::config::PreviewConfig;
use crate::content::{Document, POSTS};
use crate::{Error, Result};

/// Characters left as-is in a URL path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// An active preview: the token the CMS issued and the draft ref it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSession {
    pub token: String,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Per-request preview state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewContext {
    pub session: Option<PreviewSession>,
}

impl PreviewContext {
    /// The ref content queries must use, `None` for published content
    pub fn active_ref(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.reference.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Read the session from the request cookies. A missing, unsigned,
    /// tampered or undecodable cookie yields an inactive context.
    pub fn from_jar(jar: &SignedCookieJar, cookie_name: &str) -> Self {
        let session = jar.get(cookie_name).and_then(|cookie| {
            let decoded = percent_decode_str(cookie.value()).decode_utf8().ok()?;
            match serde_json::from_str::<PreviewSession>(&decoded) {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::debug!("Ignoring preview cookie: {}", e);
                    None
                }
            }
        });
        Self { session }
    }

    /// Cookie carrying the active session, if any
    pub fn to_cookie(&self, cookie_name: &str, max_age_seconds: i64) -> Option<Cookie<'static>> {
        let session = self.session.as_ref()?;
        let json = serde_json::to_string(session).ok()?;
        let value = utf8_percent_encode(&json, NON_ALPHANUMERIC).to_string();

        Some(
            Cookie::build((cookie_name.to_string(), value))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(max_age_seconds))
                .build(),
        )
    }
}

/// Key that signs preview cookies
pub fn signing_key(config: &PreviewConfig) -> Result<Key> {
    match config.secret.as_deref() {
        Some(secret) => Key::try_from(secret.as_bytes()).map_err(|_| {
            Error::Config("preview.secret must be at least 64 bytes".to_string())
        }),
        None => {
            tracing::warn!("No preview secret configured, preview sessions end on restart");
            Ok(Key::generate())
        }
    }
}

/// Cookie that clears a preview session in the browser
pub fn removal_cookie(cookie_name: &str) -> Cookie<'static> {
    Cookie::build((cookie_name.to_string(), String::new()))
        .path("/")
        .build()
}

/// Page a document lives at
pub fn link_resolver(document: &Document) -> String {
    match (document.doc_type.as_str(), document.uid.as_deref()) {
        (POSTS, Some(uid)) => format!("/post/{}", utf8_percent_encode(uid, PATH_SEGMENT)),
        _ => "/".to_string(),
    }
}

/// Starts and ends preview sessions
#[derive(Clone)]
pub struct PreviewSessionManager {
    client: Arc<dyn ContentClient>,
}

impl PreviewSessionManager {
    pub fn new(client: Arc<dyn ContentClient>) -> Self {
        Self { client }
    }

    /// Resolve `token` for `document_id` and store the session in `ctx`.
    ///
    /// Returns where to send the browser. An unknown or expired token is an
    /// [`Error::Authorization`] and leaves `ctx` as it was.
    pub async fn enter(
        &self,
        ctx: &mut PreviewContext,
        token: &str,
        document_id: &str,
    ) -> Result<String> {
        if token.is_empty() {
            return Err(Error::Authorization("Invalid token".to_string()));
        }

        let resolution = self
            .client
            .resolve_preview(token, document_id)
            .await?
            .ok_or_else(|| Error::Authorization("Invalid token".to_string()))?;

        let destination = link_resolver(&resolution.document);
        tracing::info!(
            "Preview started for {} at ref {}",
            destination,
            resolution.reference
        );
        ctx.session = Some(PreviewSession {
            token: token.to_string(),
            reference: resolution.reference,
        });
        Ok(destination)
    }

    /// End the session in `ctx`; calling it without a session is fine
    pub fn exit(&self, ctx: &mut PreviewContext) -> &'static str {
        if ctx.session.take().is_some() {
            tracing::info!("Preview ended");
        }
        "/"
    }
}
