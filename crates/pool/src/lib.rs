//! Per-activity runtimes: the lazy [`RuntimePool`], the Next.js child-process
//! launcher and the static file runtime used by every other framework.

pub mod nextjs;
pub mod proxy;
pub mod runtime;
pub mod runtime_pool;
pub mod static_files;

pub use nextjs::{NextMode, NextjsLauncher, NextjsOptions, NextjsRuntime};
pub use proxy::{ProxyClient, build_client, forward};
pub use runtime::{ActivityRuntime, Body, BootstrapError, RuntimeError, RuntimeLauncher};
pub use runtime_pool::{RuntimeCounts, RuntimePool, RuntimeStatus};
pub use static_files::{
    IMMUTABLE_CACHE, StaticFileRuntime, candidate_roots, content_type_for, file_response, find_file,
};
