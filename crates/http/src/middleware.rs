use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use engine::RuntimeState;
use nanoid::nanoid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const SLOW_REQUEST: Duration = Duration::from_millis(1000);

const ID_ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I',
    'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b',
    'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u',
    'v', 'w', 'x', 'y', 'z',
];

/// Tags every request with an id, logs start and end, and feeds the
/// request/error counters.
pub async fn track_requests(
    State(state): State<Arc<RuntimeState>>,
    request: Request,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| nanoid!(12, &ID_ALPHABET));
    let method = request.method().clone();
    let url = request.uri().to_string();
    let started = Instant::now();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        url = %url,
        event = "request_start",
        "request started"
    );

    let mut response = next.run(request).await;

    let elapsed = started.elapsed();
    let status = response.status();
    state.metrics.record_request(elapsed, status.is_server_error());

    let duration_ms = elapsed.as_millis() as u64;
    tracing::info!(
        request_id = %request_id,
        method = %method,
        url = %url,
        status = status.as_u16(),
        duration_ms,
        event = "request_end",
        "request completed"
    );
    if elapsed > SLOW_REQUEST {
        tracing::warn!(
            request_id = %request_id,
            url = %url,
            duration_ms,
            event = "slow_request",
            "slow request"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
