use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use registry::ActivityDescriptor;
use serde::Serialize;

use crate::runtime::{ActivityRuntime, BootstrapError, RuntimeLauncher};

type BootstrapOutcome = Result<Arc<dyn ActivityRuntime>, BootstrapError>;
type SharedBootstrap = Shared<BoxFuture<'static, BootstrapOutcome>>;

enum Slot {
    Initializing {
        bootstrap: SharedBootstrap,
        started_at: Instant,
    },
    Ready(Arc<dyn ActivityRuntime>),
    Failed(BootstrapError),
}

/// Lifecycle of one activity's runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl RuntimeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeStatus::Uninitialized => "uninitialized",
            RuntimeStatus::Initializing => "initializing",
            RuntimeStatus::Ready => "ready",
            RuntimeStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeCounts {
    pub initializing: usize,
    pub ready: usize,
    pub failed: usize,
}

/// Lazily created, never evicted runtime instances, one per activity route.
///
/// The first request for an activity starts its bootstrap on a separate
/// task; every request that arrives while it runs awaits the same shared
/// future. `Ready` and `Failed` are terminal for the life of the pool.
pub struct RuntimePool {
    launcher: Arc<dyn RuntimeLauncher>,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    bootstraps: AtomicUsize,
}

impl RuntimePool {
    pub fn new(launcher: Arc<dyn RuntimeLauncher>) -> Self {
        Self {
            launcher,
            slots: Arc::new(Mutex::new(HashMap::new())),
            bootstraps: AtomicUsize::new(0),
        }
    }

    /// Return the activity's runtime, bootstrapping it on first use.
    pub async fn get_or_create(
        &self,
        activity: &Arc<ActivityDescriptor>,
    ) -> Result<Arc<dyn ActivityRuntime>, BootstrapError> {
        let bootstrap = {
            let mut slots = lock(&self.slots);
            match slots.get(&activity.route) {
                Some(Slot::Ready(runtime)) => return Ok(Arc::clone(runtime)),
                Some(Slot::Failed(err)) => return Err(err.clone()),
                Some(Slot::Initializing { bootstrap, .. }) => bootstrap.clone(),
                None => {
                    if !activity.has_runtime() {
                        return Err(BootstrapError::Unsupported {
                            framework: activity.framework,
                        });
                    }
                    let bootstrap = self.start_bootstrap(activity);
                    slots.insert(
                        activity.route.clone(),
                        Slot::Initializing {
                            bootstrap: bootstrap.clone(),
                            started_at: Instant::now(),
                        },
                    );
                    bootstrap
                }
            }
        };
        bootstrap.await
    }

    // Runs on its own task and records the outcome itself, so a request that
    // gives up while waiting does not leave the slot initializing forever.
    fn start_bootstrap(&self, activity: &Arc<ActivityDescriptor>) -> SharedBootstrap {
        self.bootstraps.fetch_add(1, Ordering::SeqCst);
        let launcher = Arc::clone(&self.launcher);
        let slots = Arc::clone(&self.slots);
        let activity = Arc::clone(activity);
        let name = activity.name.clone();
        let route = activity.route.clone();

        let task = tokio::spawn(async move {
            let outcome = launcher.bootstrap(Arc::clone(&activity)).await;
            let mut slots = lock(&slots);
            let elapsed_ms = match slots.get(&activity.route) {
                Some(Slot::Initializing { started_at, .. }) => started_at.elapsed().as_millis() as u64,
                _ => 0,
            };
            match &outcome {
                Ok(runtime) => {
                    tracing::info!(
                        name = %activity.name,
                        route = %activity.route,
                        duration_ms = elapsed_ms,
                        "runtime ready"
                    );
                    slots.insert(activity.route.clone(), Slot::Ready(Arc::clone(runtime)));
                }
                Err(err) => {
                    tracing::error!(
                        name = %activity.name,
                        route = %activity.route,
                        path = %activity.path.display(),
                        duration_ms = elapsed_ms,
                        error = %err,
                        "runtime bootstrap failed"
                    );
                    slots.insert(activity.route.clone(), Slot::Failed(err.clone()));
                }
            }
            outcome
        });

        let slots = Arc::clone(&self.slots);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    let err = BootstrapError::Panicked {
                        activity: name,
                        message: join_err.to_string(),
                    };
                    lock(&slots).insert(route, Slot::Failed(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }

    pub fn status(&self, route: &str) -> RuntimeStatus {
        match lock(&self.slots).get(route) {
            None => RuntimeStatus::Uninitialized,
            Some(Slot::Initializing { .. }) => RuntimeStatus::Initializing,
            Some(Slot::Ready(_)) => RuntimeStatus::Ready,
            Some(Slot::Failed(_)) => RuntimeStatus::Failed,
        }
    }

    /// Number of bootstrap sequences started since the pool was created.
    pub fn bootstrap_count(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> RuntimeCounts {
        let slots = lock(&self.slots);
        let mut counts = RuntimeCounts::default();
        for slot in slots.values() {
            match slot {
                Slot::Initializing { .. } => counts.initializing += 1,
                Slot::Ready(_) => counts.ready += 1,
                Slot::Failed(_) => counts.failed += 1,
            }
        }
        counts
    }

    /// Shut down every ready runtime.
    pub async fn shutdown(&self) {
        let runtimes: Vec<(String, Arc<dyn ActivityRuntime>)> = lock(&self.slots)
            .iter()
            .filter_map(|(route, slot)| match slot {
                Slot::Ready(runtime) => Some((route.clone(), Arc::clone(runtime))),
                _ => None,
            })
            .collect();

        for (route, runtime) in runtimes {
            tracing::debug!(route = %route, "stopping runtime");
            runtime.shutdown().await;
        }
    }
}

fn lock(slots: &Mutex<HashMap<String, Slot>>) -> MutexGuard<'_, HashMap<String, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
