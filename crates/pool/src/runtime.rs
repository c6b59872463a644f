use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Request, Response};
use registry::{ActivityDescriptor, FrameworkType};
use thiserror::Error;

pub type Body = axum::body::Body;

/// A running activity that can answer requests.
///
/// The request URI handed to [`ActivityRuntime::handle`] is relative to the
/// activity's route: a request for `/a/one/_next/x.js` arrives as
/// `/_next/x.js`.
#[async_trait]
pub trait ActivityRuntime: Send + Sync {
    async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, RuntimeError>;

    /// Release whatever the runtime holds (child processes, sockets).
    async fn shutdown(&self) {}
}

/// Builds runtime instances for activities that need one.
#[async_trait]
pub trait RuntimeLauncher: Send + Sync {
    async fn bootstrap(
        &self,
        activity: Arc<ActivityDescriptor>,
    ) -> Result<Arc<dyn ActivityRuntime>, BootstrapError>;
}

/// Failure to bring up an activity runtime. Cached by the pool, so it is
/// `Clone` and carries rendered messages rather than source errors.
#[derive(Debug, Clone, Error)]
pub enum BootstrapError {
    #[error("failed to start runtime for {activity}: {message}")]
    Spawn { activity: String, message: String },
    #[error("runtime for {activity} exited during startup ({status})")]
    Exited { activity: String, status: String },
    #[error("runtime for {activity} was not ready after {seconds}s")]
    Timeout { activity: String, seconds: u64 },
    #[error("{framework} activities are served without a runtime")]
    Unsupported { framework: FrameworkType },
    #[error("bootstrap task for {activity} did not complete: {message}")]
    Panicked { activity: String, message: String },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
