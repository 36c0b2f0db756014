//! HTTP client for a Prismic-style content API

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{ContentClient, Predicate, PreviewResolution, QueryOptions};
use crate::config::CmsConfig;
use crate::content::{Document, QueryResponse};
use crate::{Error, Result};

/// API root response listing the available refs
#[derive(Debug, Deserialize)]
struct ApiInfo {
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    is_master_ref: bool,
}

/// Content client backed by the CMS REST API
pub struct PrismicClient {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl PrismicClient {
    /// Create a client for the configured endpoint
    pub fn new(config: &CmsConfig) -> Result<Self> {
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid endpoint {:?}: {}", config.endpoint, e)))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("spacetraveling/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Current published ref
    async fn master_ref(&self) -> Result<String> {
        let mut url = self.endpoint.clone();
        self.authorize(&mut url);

        let response = self.send(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Decode(format!("HTTP {} from API root", status)));
        }

        let info: ApiInfo = response.json().await?;
        info.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or_else(|| Error::Decode("API root lists no master ref".to_string()))
    }

    /// `{endpoint}/documents/search` without a query
    fn search_base(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map(|mut segments| {
                segments.pop_if_empty().extend(["documents", "search"]);
            })
            .ok();
        url
    }

    /// Build a search URL for an already resolved ref
    fn search_url(
        &self,
        reference: &str,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Url {
        let mut url = self.search_base();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ref", reference);
            let q: String = predicates.iter().map(Predicate::to_query).collect();
            query.append_pair("q", &format!("[{}]", q));
            if let Some(size) = options.page_size {
                query.append_pair("pageSize", &size.to_string());
            }
            if let Some(orderings) = &options.orderings {
                query.append_pair("orderings", orderings);
            }
            if let Some(after) = &options.after {
                query.append_pair("after", after);
            }
        }

        self.authorize(&mut url);
        url
    }

    async fn search(&self, predicates: &[Predicate], options: &QueryOptions) -> Result<Response> {
        let reference = match &options.ref_ {
            Some(reference) => reference.clone(),
            None => self.master_ref().await?,
        };
        self.send(self.search_url(&reference, predicates, options))
            .await
    }

    /// Parse a cursor, accepting only search URLs on the configured endpoint
    fn cursor_url(&self, cursor: &str) -> Result<Url> {
        let url = Url::parse(cursor).map_err(|e| Error::Decode(format!("invalid cursor: {}", e)))?;
        let base = self.search_base();
        let same_origin = url.scheme() == base.scheme()
            && url.host_str() == base.host_str()
            && url.port_or_known_default() == base.port_or_known_default();
        if !same_origin || url.path() != base.path() {
            return Err(Error::Decode(format!("cursor does not point at {}", base)));
        }
        Ok(url)
    }

    /// Append the access token unless the URL already carries one
    fn authorize(&self, url: &mut Url) {
        if let Some(token) = &self.access_token {
            if !url.query_pairs().any(|(k, _)| k == "access_token") {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
    }

    /// Send a GET; server-side failures are reported as transient
    async fn send(&self, url: Url) -> Result<Response> {
        debug!("GET {}", redact(&url));
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::TransientFetch(format!("HTTP {}", status)));
        }
        Ok(response)
    }
}

async fn decode_page(response: Response) -> Result<QueryResponse> {
    let status = response.status();
    if !status.is_success() {
        return Err(Error::Decode(format!("HTTP {} from search", status)));
    }
    Ok(response.json().await?)
}

/// URL for logging with the access token removed
fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    clean.set_query(None);
    if !pairs.is_empty() {
        clean.query_pairs_mut().extend_pairs(pairs);
    }
    clean.to_string()
}

#[async_trait]
impl ContentClient for PrismicClient {
    async fn query_by_type(
        &self,
        doc_type: &str,
        predicates: &[Predicate],
        options: &QueryOptions,
    ) -> Result<QueryResponse> {
        let mut all = vec![Predicate::document_type(doc_type)];
        all.extend_from_slice(predicates);
        decode_page(self.search(&all, options).await?).await
    }

    async fn get_by_uid(
        &self,
        doc_type: &str,
        uid: &str,
        options: &QueryOptions,
    ) -> Result<Option<Document>> {
        let predicate = Predicate::at(format!("my.{}.uid", doc_type), uid);
        let options = QueryOptions {
            page_size: Some(1),
            ..options.clone()
        };
        let page = decode_page(self.search(&[predicate], &options).await?).await?;
        Ok(page.results.into_iter().next())
    }

    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse> {
        let mut url = self.cursor_url(cursor)?;
        self.authorize(&mut url);
        decode_page(self.send(url).await?).await
    }

    async fn resolve_preview(
        &self,
        token: &str,
        document_id: &str,
    ) -> Result<Option<PreviewResolution>> {
        let options = QueryOptions::default().with_ref(Some(token)).page_size(1);
        let response = self
            .search(&[Predicate::at("document.id", document_id)], &options)
            .await?;

        if response.status().is_client_error() {
            debug!("Preview token rejected with HTTP {}", response.status());
            return Ok(None);
        }

        let page = decode_page(response).await?;
        Ok(page
            .results
            .into_iter()
            .next()
            .map(|document| PreviewResolution {
                reference: token.to_string(),
                document,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ORDER_PUBLISHED_ASC;

    fn client(token: Option<&str>) -> PrismicClient {
        PrismicClient::new(&CmsConfig {
            endpoint: "https://spacetraveling.cdn.prismic.io/api/v2/".to_string(),
            access_token: token.map(str::to_string),
            ..CmsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_search_url() {
        let c = client(None);
        let options = QueryOptions::default()
            .page_size(1)
            .orderings(ORDER_PUBLISHED_ASC)
            .after("YF1");
        let url = c.search_url("master123", &[Predicate::document_type("posts")], &options);

        assert_eq!(url.path(), "/api/v2/documents/search");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("ref".to_string(), "master123".to_string()),
                ("q".to_string(), r#"[[at(document.type,"posts")]]"#.to_string()),
                ("pageSize".to_string(), "1".to_string()),
                ("orderings".to_string(), ORDER_PUBLISHED_ASC.to_string()),
                ("after".to_string(), "YF1".to_string()),
            ]
        );
    }

    #[test]
    fn test_access_token_added_once_and_redacted() {
        let c = client(Some("secret"));
        let mut url = c.search_url("master123", &[], &QueryOptions::default());
        c.authorize(&mut url);
        assert_eq!(
            url.query_pairs().filter(|(k, _)| k == "access_token").count(),
            1
        );
        assert!(!redact(&url).contains("secret"));
        assert!(redact(&url).contains("ref=master123"));
    }

    #[test]
    fn test_cursor_must_target_search_endpoint() {
        let c = client(Some("secret"));
        assert!(c
            .cursor_url("https://spacetraveling.cdn.prismic.io/api/v2/documents/search?ref=m&page=2")
            .is_ok());

        for cursor in [
            "https://attacker.example/api/v2/documents/search?page=2",
            "http://spacetraveling.cdn.prismic.io/api/v2/documents/search?page=2",
            "https://spacetraveling.cdn.prismic.io:8443/api/v2/documents/search",
            "https://spacetraveling.cdn.prismic.io/api/v2/steal",
            "https://spacetraveling.cdn.prismic.io.attacker.example/api/v2/documents/search",
            "not a url",
        ] {
            assert!(
                matches!(c.cursor_url(cursor), Err(Error::Decode(_))),
                "accepted {}",
                cursor
            );
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = PrismicClient::new(&CmsConfig {
            endpoint: "not a url".to_string(),
            ..CmsConfig::default()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    mod http {
        use super::*;
        use crate::client::testing::post_doc;
        use crate::content::POSTS;
        use serde_json::json;
        use wiremock::{
            matchers::{method, path, query_param},
            Mock, MockServer, ResponseTemplate,
        };

        const SEARCH: &str = "/api/v2/documents/search";

        fn client_for(server: &MockServer, token: Option<&str>) -> PrismicClient {
            PrismicClient::new(&CmsConfig {
                endpoint: format!("{}/api/v2", server.uri()),
                access_token: token.map(str::to_string),
                ..CmsConfig::default()
            })
            .unwrap()
        }

        async fn mount_master_ref(server: &MockServer) {
            Mock::given(method("GET"))
                .and(path("/api/v2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "refs": [
                        { "ref": "release-1", "isMasterRef": false },
                        { "ref": "master-1", "isMasterRef": true }
                    ]
                })))
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_query_uses_master_ref_and_follows_cursor() {
            let server = MockServer::start().await;
            mount_master_ref(&server).await;

            let next_page = format!("{}{}?ref=master-1&page=2", server.uri(), SEARCH);
            Mock::given(method("GET"))
                .and(path(SEARCH))
                .and(query_param("ref", "master-1"))
                .and(query_param("q", r#"[[at(document.type,"posts")]]"#))
                .and(query_param("access_token", "secret"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "page": 1,
                    "total_pages": 2,
                    "next_page": next_page,
                    "results": [post_doc("second", "Second post", "2021-02-10T12:00:00+0000")]
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(SEARCH))
                .and(query_param("page", "2"))
                .and(query_param("access_token", "secret"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "page": 2,
                    "total_pages": 2,
                    "next_page": null,
                    "results": [post_doc("first", "First post", "2021-01-10T12:00:00+0000")]
                })))
                .mount(&server)
                .await;

            let c = client_for(&server, Some("secret"));
            let first = c
                .query_by_type(POSTS, &[], &QueryOptions::default())
                .await
                .unwrap();
            assert_eq!(first.results[0].uid.as_deref(), Some("second"));
            assert_eq!(first.next_page.as_deref(), Some(next_page.as_str()));

            let second = c.fetch_page(&next_page).await.unwrap();
            assert_eq!(second.page, 2);
            assert_eq!(second.results[0].uid.as_deref(), Some("first"));
            assert!(second.next_page.is_none());
        }

        #[tokio::test]
        async fn test_foreign_cursor_is_never_requested() {
            let server = MockServer::start().await;
            let elsewhere = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
                .mount(&elsewhere)
                .await;

            let c = client_for(&server, Some("secret"));
            for cursor in [
                format!("{}{}?page=2", elsewhere.uri(), SEARCH),
                format!("{}/steal", server.uri()),
            ] {
                let err = c.fetch_page(&cursor).await.unwrap_err();
                assert!(matches!(err, Error::Decode(_)));
            }

            assert!(elsewhere.received_requests().await.unwrap().is_empty());
            assert!(server.received_requests().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_missing_master_ref() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/v2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "refs": [] })))
                .mount(&server)
                .await;

            let err = client_for(&server, None)
                .query_by_type(POSTS, &[], &QueryOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Decode(_)));
        }

        #[tokio::test]
        async fn test_server_errors_and_throttling_are_transient() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/v2"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(SEARCH))
                .and(query_param("ref", "busy"))
                .respond_with(ResponseTemplate::new(429))
                .mount(&server)
                .await;

            let c = client_for(&server, None);
            let err = c
                .query_by_type(POSTS, &[], &QueryOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::TransientFetch(_)));

            let err = c
                .get_by_uid(POSTS, "second", &QueryOptions::default().with_ref(Some("busy")))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::TransientFetch(_)));
            assert!(err.is_transient());
        }

        #[tokio::test]
        async fn test_resolve_preview() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path(SEARCH))
                .and(query_param("ref", "preview-token"))
                .and(query_param("q", r#"[[at(document.id,"id-second")]]"#))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "results": [post_doc("second", "Second post (draft)", "2021-02-10T12:00:00+0000")]
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(SEARCH))
                .and(query_param("ref", "expired"))
                .respond_with(ResponseTemplate::new(404))
                .mount(&server)
                .await;

            let c = client_for(&server, None);
            let resolved = c
                .resolve_preview("preview-token", "id-second")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(resolved.reference, "preview-token");
            assert_eq!(resolved.document.uid.as_deref(), Some("second"));

            assert!(c.resolve_preview("expired", "id-second").await.unwrap().is_none());
        }
    }
}
