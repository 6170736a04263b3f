//! Bearer token authentication and authorization.
//!
//! - `tenant` - issuer, JWKS URI and audience rules for the tenant
//! - `claims` - typed claims and claim validation
//! - `jwks` - RSA key cache and fetcher
//! - `signature` - RS256 verification
//! - `jwt` - token validation pipeline
//! - `policy` / `permissions` - scope, role and group requirements
//! - `groups` - group-to-department resolution
//! - `gate` - per-request orchestration and decisions

pub mod claims;
pub mod gate;
pub mod groups;
pub mod jwks;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod signature;
pub mod tenant;

pub use claims::{ClaimValidator, Claims};
pub use gate::{AuthContext, AuthDecision, AuthGate, GateStage};
pub use groups::{Department, GroupMapping, GroupTable};
pub use jwks::JwksClient;
pub use jwt::JwtValidator;
pub use policy::AuthorizationPolicy;
pub use tenant::TenantConfig;
