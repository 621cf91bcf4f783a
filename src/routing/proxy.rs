use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    response::{IntoResponse, Response},
};
use derive_new::new;
use http::{HeaderMap, HeaderValue, uri::PathAndQuery};
use url::Url;

use super::{RemoteAddr, error_cause::ErrorCause};
use crate::http::{Client, headers::X_FORWARDED_FOR, strip_connection_headers};

pub fn url_join(mut base: Url, mut path: &str) -> Result<Url, url::ParseError> {
    // Add trailing slash to the base URL if it's not there
    if !base.path().ends_with('/') {
        let p = format!("{}/", base.path());
        base.set_path(&p);
    }

    // Strip the leading slash from the path if it's there
    if let Some(v) = path.strip_prefix('/') {
        path = v;
    }

    base.join(path)
}

// Appends the client to the chain of proxies
fn append_forwarded_for(headers: &mut HeaderMap, remote_addr: Option<RemoteAddr>) {
    let Some(addr) = remote_addr else {
        return;
    };

    let value = match headers.get(X_FORWARDED_FOR).and_then(|x| x.to_str().ok()) {
        Some(v) => format!("{v}, {}", addr.0),
        None => addr.0.to_string(),
    };

    if let Ok(v) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, v);
    }
}

#[derive(new)]
pub struct ProxyState {
    http_client: Arc<dyn Client>,
    upstream: Url,
    #[new(value = "PathAndQuery::from_static(\"/\")")]
    pq_default: PathAndQuery,
}

/// Forwards the request to the wrapped application and streams the response back
pub async fn proxy(
    State(state): State<Arc<ProxyState>>,
    remote_addr: Option<Extension<RemoteAddr>>,
    request: Request,
) -> Result<impl IntoResponse, ErrorCause> {
    let (mut parts, body) = request.into_parts();

    let url = url_join(
        state.upstream.clone(),
        parts
            .uri
            .path_and_query()
            .unwrap_or(&state.pq_default)
            .as_str(),
    )
    .map_err(|e| ErrorCause::MalformedRequest(format!("invalid URL: {e:#}")))?;

    // Sanitize the request headers
    strip_connection_headers(&mut parts.headers);
    append_forwarded_for(&mut parts.headers, remote_addr.map(|x| x.0));

    let mut request = reqwest::Request::new(parts.method, url);
    *request.headers_mut() = parts.headers;
    *request.body_mut() = Some(reqwest::Body::wrap_stream(body.into_data_stream()));

    let response = state
        .http_client
        .execute(request)
        .await
        .map_err(|e| ErrorCause::from(&e))?;

    let status = response.status();
    let mut headers = response.headers().clone();
    strip_connection_headers(&mut headers);

    let mut resp = Response::new(Body::from_stream(response.bytes_stream()));
    *resp.status_mut() = status;
    *resp.headers_mut() = headers;

    Ok(resp)
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr};

    use axum::{Router, body::to_bytes};
    use http::{Method, StatusCode};
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use tower::ServiceExt;

    use super::*;
    use crate::http::ReqwestClient;

    #[test]
    fn test_url_join() {
        let base_url = Url::parse("http://127.0.0.1:443/foo/bar/").unwrap();
        let url = url_join(base_url, "/latest.json?page=2").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:443/foo/bar/latest.json?page=2");

        let base_url = Url::parse("http://127.0.0.1:443/foo/bar").unwrap();
        let url = url_join(base_url, "/t/topic/1").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:443/foo/bar/t/topic/1");

        let base_url = Url::parse("http://127.0.0.1:443").unwrap();
        let url = url_join(base_url, "/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:443/");
    }

    #[test]
    fn test_append_forwarded_for() {
        let addr = RemoteAddr(IpAddr::V4(Ipv4Addr::new(81, 2, 69, 142)));

        let mut h = HeaderMap::new();
        append_forwarded_for(&mut h, None);
        assert!(h.get(X_FORWARDED_FOR).is_none());

        append_forwarded_for(&mut h, Some(addr));
        assert_eq!(h[X_FORWARDED_FOR], "81.2.69.142");

        append_forwarded_for(&mut h, Some(addr));
        assert_eq!(h[X_FORWARDED_FOR], "81.2.69.142, 81.2.69.142");
    }

    fn router(upstream: &str) -> Router {
        let client = Arc::new(ReqwestClient::new(reqwest::Client::new()));
        let state = Arc::new(ProxyState::new(client, Url::parse(upstream).unwrap()));
        Router::new().fallback(proxy).with_state(state)
    }

    #[tokio::test]
    async fn test_proxy() {
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/forum/posts.json"),
                request::query(url_decoded(contains(("draft", "1")))),
                request::body("foo"),
                request::headers(contains(("x-forwarded-for", "81.2.69.142"))),
                request::headers(contains(("x-custom", "bar"))),
                request::headers(not(contains(key("x-hop")))),
            ])
            .respond_with(
                status_code(201)
                    .insert_header("x-upstream", "yes")
                    .body("created"),
            ),
        );

        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/posts.json?draft=1")
            .header("connection", "x-hop")
            .header("x-hop", "1")
            .header("x-custom", "bar")
            .body(Body::from("foo"))
            .unwrap();
        req.extensions_mut()
            .insert(RemoteAddr(IpAddr::V4(Ipv4Addr::new(81, 2, 69, 142))));

        let resp = router(&server.url_str("/forum"))
            .oneshot(req)
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()["x-upstream"], "yes");
        let body = to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(body, "created");
    }

    #[tokio::test]
    async fn test_proxy_unreachable() {
        // Nothing listens on port 1
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = router("http://127.0.0.1:1").oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            resp.extensions().get::<ErrorCause>(),
            Some(&ErrorCause::BackendErrorConnect)
        );
    }
}
