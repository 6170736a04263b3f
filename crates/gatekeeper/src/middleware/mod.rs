//! HTTP middleware for the gatekeeper.
//!
//! - `auth` - tower layer running the authorization gate
//! - `http_metrics` - request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{AuthContextExt, AuthLayer, AuthService};
pub use http_metrics::http_metrics_middleware;
