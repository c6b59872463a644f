use std::sync::Arc;

use axum::http::{Request, Response, StatusCode, Uri};
use pool::{ActivityRuntime, Body, RuntimeError};
use registry::ActivityDescriptor;

use crate::RuntimeState;
use crate::assets::serve_next_asset;
use crate::pages::{fallback_page, html_response, not_found_page};

/// Route a request that no fixed endpoint claimed: bundler assets, then
/// activities, then the 404 page.
pub async fn route(state: &RuntimeState, request: Request<Body>) -> Response<Body> {
    let path = request.uri().path().to_string();

    if path == "/_next" || path.starts_with("/_next/") {
        return serve_next_asset(state, request).await;
    }

    if let Some((activity, remainder)) = state.routes.resolve(&path) {
        let activity = Arc::clone(activity);
        let remainder = remainder.to_string();
        return serve_activity(state, activity, &remainder, request).await;
    }

    tracing::warn!(
        url = %request.uri(),
        method = %request.method(),
        event = "404",
        "404 Not Found"
    );
    html_response(StatusCode::NOT_FOUND, not_found_page(&path))
}

/// Serve one request for `activity`; `remainder` is the path below its
/// route. Failures degrade to the placeholder page, except for the
/// activity's own `/_next` assets which answer 404.
pub async fn serve_activity(
    state: &RuntimeState,
    activity: Arc<ActivityDescriptor>,
    remainder: &str,
    request: Request<Body>,
) -> Response<Body> {
    tracing::debug!(
        name = %activity.name,
        route = %activity.route,
        url = %request.uri(),
        method = %request.method(),
        "activity request"
    );
    let request = rebase(request, remainder);
    let is_asset = remainder.starts_with("/_next/");

    if activity.has_runtime() {
        let runtime = match state.pool.get_or_create(&activity).await {
            Ok(runtime) => runtime,
            Err(err) => {
                state.metrics.record_error();
                tracing::debug!(name = %activity.name, error = %err, "runtime unavailable");
                return degraded(&activity, is_asset);
            }
        };
        return match runtime.handle(request).await {
            Ok(response) => response,
            Err(err) => {
                state.metrics.record_error();
                tracing::warn!(name = %activity.name, error = %err, "runtime request failed");
                degraded(&activity, is_asset)
            }
        };
    }

    let Some(runtime) = state.static_runtime(&activity.route) else {
        return degraded(&activity, is_asset);
    };
    match runtime.handle(request).await {
        Ok(response) => response,
        Err(RuntimeError::NotFound(_)) => degraded(&activity, false),
        Err(err) => {
            tracing::warn!(name = %activity.name, error = %err, "static file read failed");
            degraded(&activity, false)
        }
    }
}

fn degraded(activity: &ActivityDescriptor, is_asset: bool) -> Response<Body> {
    if is_asset {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NOT_FOUND;
        return response;
    }
    tracing::debug!(
        name = %activity.name,
        route = %activity.route,
        event = "static_fallback",
        "serving static fallback"
    );
    html_response(StatusCode::OK, fallback_page(activity))
}

/// Replace the request path with `remainder`, keeping the query string.
fn rebase(mut request: Request<Body>, remainder: &str) -> Request<Body> {
    let target = match request.uri().query() {
        Some(query) => format!("{}?{}", remainder, query),
        None => remainder.to_string(),
    };
    match target.parse::<Uri>() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(err) => {
            tracing::debug!(uri = %target, error = %err, "could not rebase request");
            *request.uri_mut() = Uri::from_static("/");
        }
    }
    request
}
