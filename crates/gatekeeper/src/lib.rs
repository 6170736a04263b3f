//! Gatekeeper Service Library
//!
//! Bearer-token verification and authorization gate for a single directory
//! tenant. Every protected request passes through the gate, which:
//!
//! - parses the compact token from the `Authorization` header
//! - checks `exp`/`nbf`, issuer and audience
//! - resolves the RSA signing key from the tenant's cached JWKS
//! - verifies the RS256 signature
//! - enforces scope, role and group policy
//!
//! and then hands the verified claims to the wrapped handler.
//!
//! # Modules
//!
//! - `auth` - Token validation, key cache, policy and the gate
//! - `config` - Service configuration from environment
//! - `errors` - Failure taxonomy with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Tower auth layer and HTTP metrics
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
