use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Request, Response, Uri};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use crate::runtime::{Body, RuntimeError};

pub type ProxyClient = Client<HttpConnector, Body>;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const FORWARDED_PREFIX: HeaderName = HeaderName::from_static("x-forwarded-prefix");

pub fn build_client() -> ProxyClient {
    Client::builder(TokioExecutor::new()).build_http()
}

/// Forward `request` (URI relative to the activity) to a runtime listening
/// on `127.0.0.1:<port>` and stream its response back.
pub async fn forward(
    client: &ProxyClient,
    port: u16,
    mount: &str,
    request: Request<Body>,
) -> Result<Response<Body>, RuntimeError> {
    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("http://127.0.0.1:{}{}", port, path_and_query);
    parts.uri = target
        .parse::<Uri>()
        .map_err(|err| RuntimeError::InvalidRequest(err.to_string()))?;

    strip_hop_by_hop(&mut parts.headers);
    if let Ok(host) = HeaderValue::from_str(&format!("127.0.0.1:{}", port)) {
        parts.headers.insert(header::HOST, host);
    }
    if let Ok(prefix) = HeaderValue::from_str(mount) {
        parts.headers.insert(FORWARDED_PREFIX, prefix);
    }

    let response = client
        .request(Request::from_parts(parts, body))
        .await
        .map_err(|err| RuntimeError::Upstream(err.to_string()))?;

    let mut response = response.map(Body::new);
    strip_hop_by_hop(response.headers_mut());
    Ok(response)
}

fn strip_hop_by_hop(headers: &mut axum::http::HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
