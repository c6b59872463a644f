pub mod assets;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod pages;

use std::collections::HashMap;
use std::sync::Arc;

use pool::{RuntimeLauncher, RuntimePool, StaticFileRuntime};
use registry::RouteTable;

pub use assets::{serve_next_asset, referer_route};
pub use catalog::ActivitySummary;
pub use config::{ConfigError, NextjsConfig, ServerConfig};
pub use dispatch::{route, serve_activity};
pub use metrics::{MetricsSnapshot, ServerMetrics, format_duration};

/// Everything a request handler needs, shared behind an `Arc`.
pub struct RuntimeState {
    pub config: ServerConfig,
    pub routes: RouteTable,
    pub pool: RuntimePool,
    pub metrics: ServerMetrics,
    static_runtimes: HashMap<String, Arc<StaticFileRuntime>>,
}

impl RuntimeState {
    pub fn new(config: ServerConfig, routes: RouteTable, launcher: Arc<dyn RuntimeLauncher>) -> Self {
        let static_runtimes = routes
            .iter()
            .filter(|activity| !activity.has_runtime())
            .map(|activity| {
                (
                    activity.route.clone(),
                    Arc::new(StaticFileRuntime::new(Arc::clone(activity))),
                )
            })
            .collect();

        Self {
            config,
            routes,
            pool: RuntimePool::new(launcher),
            metrics: ServerMetrics::new(),
            static_runtimes,
        }
    }

    pub fn static_runtime(&self, route: &str) -> Option<&Arc<StaticFileRuntime>> {
        self.static_runtimes.get(route)
    }

    /// Activities in discovery order, as listed by `/api/activities`.
    pub fn catalog(&self) -> Vec<ActivitySummary> {
        self.routes
            .iter()
            .map(|activity| {
                let runtime = activity
                    .has_runtime()
                    .then(|| self.pool.status(&activity.route));
                ActivitySummary::new(activity, self.config.activity_url(&activity.route), runtime)
            })
            .collect()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.routes.len(), self.pool.counts())
    }
}
