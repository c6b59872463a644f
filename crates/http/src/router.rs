use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderName, StatusCode};
use axum::http::header::{ACCEPT, CONTENT_TYPE, ORIGIN};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router, middleware};
use engine::RuntimeState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;

use crate::dashboard::{browse_page, dashboard_page};
use crate::middleware::track_requests;

pub fn app_router(state: Arc<RuntimeState>) -> Router {
    let mut router = Router::new()
        .route("/", get(dashboard))
        .route("/browse", get(browse))
        .route("/health", get(health))
        .route("/api/activities", get(list_activities))
        .route("/api/metrics", get(metrics))
        .nest_service("/assets", ServeDir::new(state.config.assets_dir()))
        .fallback(dispatch)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            track_requests,
        ));

    if state.config.cors {
        router = router.layer(cors_layer());
    }
    router.with_state(state)
}

/// `Access-Control-Allow-Origin: *` with the headers browsers send for
/// activity form posts.
fn cors_layer() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_headers([
        ORIGIN,
        HeaderName::from_static("x-requested-with"),
        CONTENT_TYPE,
        ACCEPT,
    ])
}

async fn dashboard(State(state): State<Arc<RuntimeState>>) -> Html<String> {
    Html(dashboard_page(&state))
}

async fn browse(State(state): State<Arc<RuntimeState>>) -> Html<String> {
    let page = state.config.browser_page();
    match tokio::fs::read_to_string(&page).await {
        Ok(html) => Html(html),
        Err(err) => {
            if page.exists() {
                tracing::warn!(path = %page.display(), error = %err, "failed to read activity browser");
            }
            Html(browse_page(&state))
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn list_activities(State(state): State<Arc<RuntimeState>>) -> Response {
    let catalog = state.catalog();
    tracing::info!(
        endpoint = "/api/activities",
        count = catalog.len(),
        event = "api_request",
        "API request served"
    );
    Json(catalog).into_response()
}

async fn metrics(State(state): State<Arc<RuntimeState>>) -> Response {
    Json(state.metrics_snapshot()).into_response()
}

async fn dispatch(State(state): State<Arc<RuntimeState>>, request: Request) -> Response {
    engine::route(&state, request).await
}
