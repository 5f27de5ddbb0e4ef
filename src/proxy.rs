//! Stateless edge proxy in front of the upstream comic API.
//!
//! One routing decision per request, no retries. Every response carries
//! permissive CORS headers; successful upstream responses are additionally
//! marked cacheable.

use std::time::Duration;

use anyhow::Context as _;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{
    ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, ETAG, LAST_MODIFIED, USER_AGENT,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse as _, Response};
use tower_http::trace::TraceLayer;
use url::Url;


pub const DEFAULT_UPSTREAM: &str = "https://xkcd.com";
pub const DEFAULT_MAX_AGE_SECS: u32 = 3600;
const PROXY_USER_AGENT: &str = "readxkcd-worker/1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRoute {
    Preflight,
    Latest,
    /// The digits are forwarded as written, even past the range of an id.
    Comic(String),
    NotFound,
}

/// `OPTIONS` is always a preflight. Otherwise the path alone decides:
/// empty or `latest`, a run of digits, or nothing.
#[must_use]
pub fn route(method: &Method, path: &str) -> ProxyRoute {
    if method == Method::OPTIONS {
        return ProxyRoute::Preflight;
    }
    let path = path.trim_start_matches('/');
    if path.is_empty() || path == "latest" {
        return ProxyRoute::Latest;
    }
    if path.bytes().all(|b| b.is_ascii_digit()) {
        return ProxyRoute::Comic(path.to_owned());
    }
    ProxyRoute::NotFound
}

#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    upstream: Url,
    cache_control: HeaderValue,
}

impl ProxyState {
    pub fn new(upstream: &Url, max_age_secs: u32) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("build upstream http client")?;
        let cache_control = HeaderValue::from_str(&format!("public, max-age={max_age_secs}"))
            .context("build cache-control header")?;
        let mut upstream = upstream.clone();
        if !upstream.path().ends_with('/') {
            let path = format!("{}/", upstream.path());
            upstream.set_path(&path);
        }
        Ok(Self {
            client,
            upstream,
            cache_control,
        })
    }

    /// `info.0.json` for the latest comic, `{digits}/info.0.json` otherwise.
    fn upstream_url(&self, comic: Option<&str>) -> anyhow::Result<Url> {
        let path = match comic {
            None => "info.0.json".to_owned(),
            Some(digits) => format!("{digits}/info.0.json"),
        };
        self.upstream
            .join(&path)
            .with_context(|| format!("join {path} onto {}", self.upstream))
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle(State(state): State<ProxyState>, method: Method, uri: Uri) -> Response {
    match route(&method, uri.path()) {
        ProxyRoute::Preflight => with_cors(StatusCode::OK.into_response()),
        ProxyRoute::NotFound => with_cors((StatusCode::NOT_FOUND, "Not Found").into_response()),
        ProxyRoute::Latest => forward_or_bad_gateway(&state, None).await,
        ProxyRoute::Comic(digits) => forward_or_bad_gateway(&state, Some(digits.as_str())).await,
    }
}

async fn forward_or_bad_gateway(state: &ProxyState, comic: Option<&str>) -> Response {
    match forward(state, comic).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(comic = comic.unwrap_or("latest"), ?err, "upstream request failed");
            with_cors((StatusCode::BAD_GATEWAY, "Bad Gateway").into_response())
        }
    }
}

async fn forward(state: &ProxyState, comic: Option<&str>) -> anyhow::Result<Response> {
    let url = state.upstream_url(comic)?;
    let upstream = state
        .client
        .get(url.clone())
        .header(USER_AGENT, PROXY_USER_AGENT)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;

    let status = upstream.status();
    let mut headers = HeaderMap::new();
    for name in [CONTENT_TYPE, ETAG, LAST_MODIFIED] {
        if let Some(value) = upstream.headers().get(&name) {
            headers.insert(name, value.clone());
        }
    }
    let body = upstream
        .bytes()
        .await
        .with_context(|| format!("read body of {url}"))?;
    tracing::debug!(%url, %status, bytes = body.len(), "proxied upstream response");

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    if status.is_success() {
        response
            .headers_mut()
            .insert(CACHE_CONTROL, state.cache_control.clone());
    }
    Ok(with_cors(response))
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    response
}
