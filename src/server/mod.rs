//! HTTP server for materialized pages and preview sessions

use anyhow::Result;
use axum::{
    extract::{FromRef, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

use crate::config::PreviewConfig;
use crate::materialize::{ListPage, PageMaterializer, SingleOutcome};
use crate::preview::{removal_cookie, signing_key, PreviewContext, PreviewSessionManager};
use crate::Error;

/// Shared handler state
#[derive(Clone)]
struct AppState {
    materializer: PageMaterializer,
    previews: PreviewSessionManager,
    preview_config: PreviewConfig,
    cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PreviewQuery {
    token: Option<String>,
    #[serde(rename = "documentID")]
    document_id: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Authorization(_) => StatusCode::UNAUTHORIZED,
            Error::TransientFetch(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::MalformedContent { .. } | Error::Decode(_) | Error::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            Error::Authorization(_) => "Invalid token".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!("{}", message);
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Build the router.
///
/// Routes:
/// - `GET /` and `GET /api/posts?cursor=` - list page
/// - `GET /post/:slug` - single post, honoring the preview cookie
/// - `GET /api/preview?token=&documentID=` - start a preview session
/// - `GET /api/exit-preview` - end it
/// - `GET /health`
///
/// Fails when the preview signing secret is unusable.
pub fn router(materializer: PageMaterializer) -> Result<Router, Error> {
    let preview_config = materializer.config().preview.clone();
    let state = AppState {
        previews: PreviewSessionManager::new(materializer.client()),
        cookie_key: signing_key(&preview_config)?,
        preview_config,
        materializer,
    };

    let app = Router::new()
        .route("/", get(list_handler))
        .route("/api/posts", get(list_handler))
        .route("/post/:slug", get(post_handler))
        .route("/api/preview", get(preview_handler))
        .route("/api/exit-preview", get(exit_preview_handler))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    Ok(app)
}

/// Serve until the process is stopped
pub async fn start(materializer: PageMaterializer, ip: &str, port: u16, prerender: bool) -> Result<()> {
    let app = router(materializer.clone())?;
    if prerender {
        tracing::info!("Prerendering pages...");
        materializer.prerender().await;
    }

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn list_handler(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListPage>, Error> {
    let page = state.materializer.list(query.cursor.as_deref()).await?;
    Ok(Json(page))
}

async fn post_handler(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    jar: SignedCookieJar,
) -> Result<Response, Error> {
    let ctx = PreviewContext::from_jar(&jar, &state.preview_config.cookie_name);
    if ctx.is_active() {
        tracing::debug!("Serving {} under preview ref", slug);
    }
    let response = match state.materializer.single(&slug, ctx.active_ref()).await? {
        SingleOutcome::Page(page) => Json(page).into_response(),
        SingleOutcome::Redirect { destination } => Redirect::temporary(&destination).into_response(),
    };
    Ok(response)
}

async fn preview_handler(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
    jar: SignedCookieJar,
) -> Result<(SignedCookieJar, Response), Error> {
    let config = &state.preview_config;
    let mut ctx = PreviewContext::from_jar(&jar, &config.cookie_name);

    let destination = state
        .previews
        .enter(
            &mut ctx,
            query.token.as_deref().unwrap_or_default(),
            query.document_id.as_deref().unwrap_or_default(),
        )
        .await?;

    let jar = match ctx.to_cookie(&config.cookie_name, config.max_age_seconds) {
        Some(cookie) => jar.add(cookie),
        None => jar,
    };
    let redirect = (StatusCode::FOUND, [(header::LOCATION, destination)]).into_response();
    Ok((jar, redirect))
}

async fn exit_preview_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Redirect) {
    let cookie_name = &state.preview_config.cookie_name;
    let mut ctx = PreviewContext::from_jar(&jar, cookie_name);
    let destination = state.previews.exit(&mut ctx);
    (jar.remove(removal_cookie(cookie_name)), Redirect::temporary(destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::CountingClient;
    use crate::config::SiteConfig;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Arc<CountingClient>, Router) {
        let client = Arc::new(CountingClient::new());
        let materializer = PageMaterializer::new(client.clone(), SiteConfig::default());
        (client, router(materializer).unwrap())
    }

    async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn header_str<'a>(response: &'a Response, name: header::HeaderName) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_list_page() {
        let (_, app) = app();
        let response = get(&app, "/", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["results"].as_array().unwrap().len(), 3);
        assert!(json["nextCursor"].is_null());
        assert_eq!(json["revalidate"], 3600);
    }

    #[tokio::test]
    async fn test_post_page_and_redirect() {
        let (_, app) = app();

        let response = get(&app, "/post/second", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["post"]["title"], "Second post");
        assert_eq!(json["nextPost"]["uid"], "third");
        assert_eq!(json["prevPost"]["uid"], "first");
        assert_eq!(json["preview"], false);

        let response = get(&app, "/post/missing", None).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(header_str(&response, header::LOCATION), "/");
    }

    #[tokio::test]
    async fn test_preview_flow() {
        let (_, app) = app();

        let response = get(&app, "/api/preview?token=valid-token&documentID=id-second", None).await;
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(header_str(&response, header::LOCATION), "/post/second");

        let set_cookie = header_str(&response, header::SET_COOKIE).to_string();
        assert!(set_cookie.starts_with("io.prismic.preview="));
        assert!(set_cookie.contains("HttpOnly"));
        let cookie = set_cookie.split(';').next().unwrap();

        let json = body_json(get(&app, "/post/second", Some(cookie)).await).await;
        assert_eq!(json["post"]["title"], "Second post (draft)");
        assert_eq!(json["preview"], true);

        let response = get(&app, "/api/exit-preview", Some(cookie)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(header_str(&response, header::LOCATION), "/");
        assert!(header_str(&response, header::SET_COOKIE).starts_with("io.prismic.preview="));

        let json = body_json(get(&app, "/post/second", None).await).await;
        assert_eq!(json["post"]["title"], "Second post");
    }

    #[tokio::test]
    async fn test_forged_preview_cookie_is_ignored() {
        let (client, app) = app();

        let response = get(&app, "/api/preview?token=valid-token&documentID=id-second", None).await;
        let set_cookie = header_str(&response, header::SET_COOKIE).to_string();
        let cookie = set_cookie.split(';').next().unwrap();
        let tampered = cookie.replace("draft", "drafx");
        assert_ne!(tampered, cookie);

        let unsigned = format!(
            "io.prismic.preview={}",
            r#"%7B%22token%22%3A%22t%22%2C%22ref%22%3A%22draft%2Dref%22%7D"#
        );
        for forged in [tampered, unsigned] {
            let before = client.calls();
            let response = get(&app, "/post/second", Some(&forged)).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            assert_eq!(json["post"]["title"], "Second post");
            assert_eq!(json["preview"], false);
            assert!(client.refs.lock().unwrap()[before..].iter().all(Option::is_none));
        }
    }

    #[test]
    fn test_short_preview_secret_is_rejected() {
        let mut config = SiteConfig::default();
        config.preview.secret = Some("short".to_string());
        let materializer = PageMaterializer::new(Arc::new(CountingClient::new()), config);
        assert!(matches!(router(materializer), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_invalid_preview_token() {
        let (_, app) = app();

        for uri in [
            "/api/preview?token=expired&documentID=id-second",
            "/api/preview?documentID=id-second",
        ] {
            let response = get(&app, uri, None).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert!(response.headers().get(header::SET_COOKIE).is_none());
            assert_eq!(body_json(response).await, json!({ "message": "Invalid token" }));
        }
    }

    #[tokio::test]
    async fn test_transient_failure_maps_to_503() {
        let (client, app) = app();
        client.set_failing(true);

        let response = get(&app, "/post/second", None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_json(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = app();
        assert_eq!(get(&app, "/health", None).await.status(), StatusCode::OK);
    }

    #[test]
    fn test_error_status() {
        assert_eq!(
            Error::malformed("id", "uid").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::Decode("bad".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
