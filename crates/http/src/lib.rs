mod dashboard;
mod listener;
mod middleware;
mod router;
mod server;

pub use listener::bind_listener;
pub use middleware::REQUEST_ID_HEADER;
pub use router::app_router;
pub use server::{serve_http, serve_on};
