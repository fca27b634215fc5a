//! Assembles the Axum [`Router`] in front of a [`Registry`].
//!
//! Every path goes to one fallback handler. It converts the HTTP request into
//! a core [`restmap::Request`], runs [`Registry::dispatch`] on the blocking
//! pool (a writer waiting on a resource lock must not stall an async worker),
//! and converts the result back.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use restmap::{Method, Registry};
use tower_http::trace::TraceLayer;

use crate::{config::NodeConfig, error::AppError};

/// Shared state threaded through the handler via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub max_body_bytes: usize,
}

/// Build the application router with the default body limit.
pub fn build_router(registry: Arc<Registry>) -> Router {
    build_router_with(registry, &NodeConfig::default())
}

/// Build the application router using `config` for transport limits.
pub fn build_router_with(registry: Arc<Registry>, config: &NodeConfig) -> Router {
    let state = AppState {
        registry,
        max_body_bytes: config.max_body_bytes,
    };

    Router::new()
        .fallback(serve)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn serve(State(state): State<AppState>, req: Request) -> Result<Response, AppError> {
    let remote = extract_peer(&req);
    let (parts, body) = req.into_parts();

    let path = urlencoding::decode(parts.uri.path())
        .map_err(|e| AppError::BadPath(e.to_string()))?
        .into_owned();

    if declared_length(&parts.headers).is_some_and(|len| len > state.max_body_bytes) {
        return Err(AppError::PayloadTooLarge(state.max_body_bytes));
    }
    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| AppError::Body(e.to_string()))?;

    let request = restmap::Request {
        method: Method::from(parts.method.as_str()),
        path,
        accept: header_values(&parts.headers, header::ACCEPT),
        content_type: parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.to_vec(),
        remote,
    };

    let registry = Arc::clone(&state.registry);
    let response = tokio::task::spawn_blocking(move || registry.dispatch(&request))
        .await
        .map_err(|e| AppError::Internal(format!("task join error: {e}")))??;

    Ok(into_http(response))
}

fn into_http(response: restmap::Response) -> Response {
    let status =
        StatusCode::from_u16(response.status.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in response.headers {
        // Locations are built from decoded paths.
        let value = if name.eq_ignore_ascii_case("location") {
            encode_path(&value)
        } else {
            value
        };
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(response.body.unwrap_or_default()))
        .unwrap_or_else(|e| AppError::Internal(e.to_string()).into_response())
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn header_values(headers: &HeaderMap, name: header::HeaderName) -> Vec<String> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// The peer address from the connection, else from common proxy headers.
fn extract_peer(req: &Request) -> Option<String> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.to_string());
    }

    // X-Forwarded-For: client, proxy1, proxy2  (leftmost is the real client).
    if let Some(ip) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(ip.to_string());
    }

    req.headers()
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::sync::RwLock;

    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::error::ErrorResponse;
    use crate::sample::{self, Mounted};

    fn build_app() -> (Router, Mounted) {
        let registry = Arc::new(Registry::new());
        let mounted = sample::mount(&registry).unwrap();
        (build_router(registry), mounted)
    }

    fn request(method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    async fn body_text(resp: Response) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn get_nested_value() {
        let (app, _) = build_app();
        let req = request("GET", "/mutable/numbers/2").body(Body::empty()).unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert_eq!(ct, "application/json");
        assert_eq!(resp.headers().get("vary").unwrap(), "Accept");
        assert_eq!(body_text(resp).await, "42");
    }

    #[tokio::test]
    async fn accept_header_selects_plain_text() {
        let (app, _) = build_app();
        let req = request("GET", "/str")
            .header("accept", "text/html, text/plain;q=0.9")
            .body(Body::empty())
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(ct.starts_with("text/plain"));
        assert_eq!(body_text(resp).await, "test");
    }

    #[tokio::test]
    async fn missing_sub_entity_is_a_json_404() {
        let (app, _) = build_app();
        let req = request("GET", "/mutable/numbers/true").body(Body::empty()).unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(body.code, "not_found");
        assert!(body.error.contains("numbers/true"));
    }

    #[tokio::test]
    async fn delete_on_record_is_405() {
        let (app, _) = build_app();
        let req = request("DELETE", "/mutable/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn options_lists_allowed_methods() {
        let (app, _) = build_app();
        let req = request("OPTIONS", "/readonly/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("allow").unwrap(), "OPTIONS, HEAD, GET");
    }

    #[tokio::test]
    async fn put_updates_the_shared_handle() {
        let (app, mounted) = build_app();
        let req = request("PUT", "/int")
            .header("content-type", "application/json")
            .body(Body::from("17"))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "17");
        assert_eq!(*mounted.int.read().unwrap(), 17);
    }

    #[tokio::test]
    async fn put_on_snapshot_is_forbidden() {
        let (app, _) = build_app();
        let req = request("PUT", "/readonly/string")
            .body(Body::from("\"x\""))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: ErrorResponse = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(body.code, "read_only");
    }

    #[tokio::test]
    async fn post_sets_an_encoded_location() {
        let registry = Arc::new(Registry::new());
        let list = Arc::new(RwLock::new(vec![String::from("a")]));
        registry.map("/my list", Arc::clone(&list)).unwrap();
        let app = build_router(registry);

        let req = request("POST", "/my%20list")
            .header("content-type", "text/plain")
            .body(Body::from("b"))
            .unwrap();

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers().get("location").unwrap(), "/my%20list/1");
        assert_eq!(body_text(resp).await, r#"["a","b"]"#);
        assert_eq!(list.read().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_method_is_501() {
        let (app, _) = build_app();
        let req = request("BREW", "/mutable/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn unmapped_path_is_404() {
        let (app, _) = build_app();
        let req = request("GET", "/missing/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let registry = Arc::new(Registry::new());
        sample::mount(&registry).unwrap();
        let config = NodeConfig {
            max_body_bytes: 4,
            ..NodeConfig::default()
        };
        let app = build_router_with(registry, &config);

        let req = request("PUT", "/int")
            .header("content-length", "6")
            .body(Body::from("123456"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn peer_comes_from_proxy_headers_without_connect_info() {
        let req = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_peer(&req).as_deref(), Some("10.0.0.1"));

        let req = Request::builder()
            .uri("/")
            .header("x-real-ip", "10.0.0.9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_peer(&req).as_deref(), Some("10.0.0.9"));

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(extract_peer(&req), None);
    }
}
