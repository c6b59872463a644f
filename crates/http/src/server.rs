use std::net::SocketAddr;
use std::sync::Arc;

use engine::RuntimeState;

use crate::listener::bind_listener;
use crate::router::app_router;

/// Serve until Ctrl-C (or SIGTERM), then stop every activity runtime.
pub async fn serve_http(state: Arc<RuntimeState>, addr: SocketAddr) -> Result<(), String> {
    let listener = bind_listener(addr)?;
    serve_on(state, listener, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_on<F>(
    state: Arc<RuntimeState>,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> Result<(), String>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let local_addr = listener
        .local_addr()
        .map_err(|err| format!("listener address unavailable: {}", err))?;
    tracing::info!(addr = %local_addr, "activity server listening");

    let app = app_router(Arc::clone(&state));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| format!("server error: {}", err));

    tracing::info!(event = "shutdown", "server shutdown initiated");
    state.pool.shutdown().await;
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(err) => {
                    tracing::warn!("failed to listen for SIGTERM: {}", err);
                    std::future::pending::<()>().await;
                }
            }
        };
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
