use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::http::header::REFERER;
use axum::http::{HeaderMap, Request, Response, StatusCode, Uri};
use pool::{Body, IMMUTABLE_CACHE, file_response};
use registry::ActivityDescriptor;

use crate::RuntimeState;
use crate::pages::text_response;

const STATIC_PREFIX: &str = "/_next/static/";

/// Build-output directories holding `/_next/static/*` files for an activity.
fn asset_dirs(activity: &ActivityDescriptor) -> [PathBuf; 3] {
    [
        activity.path.join(".next").join("static"),
        activity.path.join("out").join("_next").join("static"),
        activity.path.join("build").join("_next").join("static"),
    ]
}

/// Route (`/{domain}/{name}`) of the page that referenced an asset.
pub fn referer_route(headers: &HeaderMap) -> Option<String> {
    let referer = headers.get(REFERER)?.to_str().ok()?;
    let uri: Uri = referer.parse().ok()?;
    let mut segments = uri.path().split('/').filter(|segment| !segment.is_empty());
    let domain = segments.next()?;
    let name = segments.next()?;
    Some(format!("/{}/{}", domain, name))
}

/// Serve a `/_next/*` request that carries no activity prefix.
///
/// The activity named by the `Referer` gets the request first, through its
/// runtime. If that is not possible the build outputs are searched, the
/// referring activity's first, so an identically named chunk from another
/// activity is only used when the referrer has none.
pub async fn serve_next_asset(state: &RuntimeState, request: Request<Body>) -> Response<Body> {
    let started = Instant::now();
    let url = request.uri().to_string();
    let asset_path = request.uri().path().to_string();
    let owner = referer_route(request.headers())
        .and_then(|route| state.routes.get(&route).cloned())
        .filter(|activity| activity.has_runtime());

    tracing::debug!(
        url = %url,
        owner = owner.as_ref().map(|a| a.route.as_str()).unwrap_or(""),
        event = "asset_request",
        "static asset request"
    );

    if let Some(activity) = &owner {
        match state.pool.get_or_create(activity).await {
            Ok(runtime) => match runtime.handle(request).await {
                Ok(response) if response.status() != StatusCode::NOT_FOUND => {
                    tracing::debug!(name = %activity.name, url = %url, "asset served by runtime");
                    return response;
                }
                Ok(_) => {}
                Err(err) => {
                    state.metrics.record_error();
                    tracing::debug!(name = %activity.name, error = %err, "asset routing error");
                }
            },
            Err(err) => {
                tracing::debug!(name = %activity.name, error = %err, "asset owner has no runtime");
            }
        }
    }

    let Some(relative) = asset_path
        .strip_prefix(STATIC_PREFIX)
        .and_then(pool::static_files::relative_request_path)
        .filter(|relative| !relative.as_os_str().is_empty())
    else {
        return asset_not_found(&url);
    };

    let candidates = owner.iter().chain(
        state
            .routes
            .runtime_activities()
            .filter(|activity| owner.as_ref().is_none_or(|owner| !Arc::ptr_eq(owner, activity))),
    );
    for activity in candidates {
        for dir in asset_dirs(activity) {
            let file = dir.join(&relative);
            if !file.is_file() {
                continue;
            }
            match file_response(&file, Some(IMMUTABLE_CACHE)).await {
                Ok(response) => {
                    tracing::info!(
                        path = %file.display(),
                        name = %activity.name,
                        duration_ms = started.elapsed().as_millis() as u64,
                        event = "asset_served",
                        "static asset served"
                    );
                    return response;
                }
                Err(err) => {
                    tracing::warn!(path = %file.display(), error = %err, "failed to read asset");
                }
            }
        }
    }

    asset_not_found(&url)
}

fn asset_not_found(url: &str) -> Response<Body> {
    tracing::debug!(url = %url, event = "asset_not_found", "asset not found");
    text_response(StatusCode::NOT_FOUND, "Asset not found")
}
