use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use engine::{RuntimeState, ServerConfig};
use pool::NextjsLauncher;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let started = Instant::now();
    tracing::info!(event = "server_init_start", "initializing activity server");

    let config = ServerConfig::load().context("failed to load configuration")?;
    let addr = config.listen_addr().context("invalid listen address")?;

    let routes = registry::discover(&config.base_dir, &config.search_roots);
    if routes.is_empty() {
        stdio::warn(
            "registry",
            &format!("no activities found under {}", config.base_dir.display()),
        );
    }

    let launcher = Arc::new(NextjsLauncher::new(config.nextjs_options()));
    let state = Arc::new(RuntimeState::new(config, routes, launcher));

    startup_summary(&state, &addr.to_string()).print();
    tracing::info!(
        activities = state.routes.len(),
        duration_ms = started.elapsed().as_millis() as u64,
        event = "server_init_complete",
        "activity server initialized"
    );

    http::serve_http(state, addr)
        .await
        .map_err(anyhow::Error::msg)
}

/// `RUST_LOG` filters (default `info`); `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

fn startup_summary(state: &RuntimeState, listen_addr: &str) -> stdio::StartupSummary {
    stdio::StartupSummary {
        public_url: state.config.public_url(),
        listen_addr: listen_addr.to_string(),
        activities: state
            .routes
            .iter()
            .map(|activity| {
                (
                    activity.domain.clone(),
                    activity.route.clone(),
                    activity.framework.to_string(),
                )
            })
            .collect(),
    }
}
