//! Activity registry for the seamless activity server.
//!
//! Discovery runs once at startup: every configured search root is walked,
//! each candidate directory is classified by the markers it carries, and the
//! result is an insertion-ordered [`RouteTable`] keyed by `/{domain}/{name}`.
//! Nothing in here fails the whole pass because of one bad directory.

mod activity;
mod discovery;
mod error;
mod framework;
mod route_table;

pub use activity::{ACTIVITY_CONFIG_FILE, ActivityDescriptor, ActivityMeta};
pub use discovery::{SearchRoot, default_search_roots, discover};
pub use error::DiscoveryError;
pub use framework::{FrameworkType, classify};
pub use route_table::RouteTable;
