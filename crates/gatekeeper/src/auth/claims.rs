//! JWT claims structure and claim validation.
//!
//! `Claims` is the typed payload of an access token. Personal identifiers are
//! redacted in Debug output to prevent exposure in logs.
//!
//! `ClaimValidator` performs the temporal, issuer and audience checks. It runs
//! before key resolution because the issuer decides which JWKS URI is used,
//! but passing it never makes a token trusted on its own: the signature must
//! still verify.

use crate::auth::tenant::TenantConfig;
use crate::errors::AuthError;
use common::jwt::validate_temporal_at;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Access token claims.
///
/// `iss` and `aud` are required; a payload without them (or with values of
/// the wrong JSON type) fails to parse and the token is rejected as
/// malformed.
#[derive(Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer URL.
    pub iss: String,

    /// Audience (application id or application id URI).
    pub aud: String,

    /// Subject - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Directory object id - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oid: Option<String>,

    /// Display name - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Sign-in name - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Space-separated delegated scopes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scp: Option<String>,

    /// Application roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// Directory group object ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("oid", &self.oid.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name.as_ref().map(|_| "[REDACTED]"))
            .field(
                "preferred_username",
                &self.preferred_username.as_ref().map(|_| "[REDACTED]"),
            )
            .field("exp", &self.exp)
            .field("nbf", &self.nbf)
            .field("iat", &self.iat)
            .field("scp", &self.scp)
            .field("roles", &self.roles)
            .field("groups", &self.groups.as_ref().map(Vec::len))
            .finish()
    }
}

impl Claims {
    /// Check if the token has a specific scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }

    /// Get all scopes as a vector. Empty if `scp` is absent.
    pub fn scopes(&self) -> Vec<&str> {
        self.scp
            .as_deref()
            .map(|scp| scp.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Application roles, empty if absent.
    pub fn roles(&self) -> &[String] {
        self.roles.as_deref().unwrap_or_default()
    }

    /// Group ids, empty if absent.
    pub fn groups(&self) -> &[String] {
        self.groups.as_deref().unwrap_or_default()
    }
}

/// Validates temporal, issuer and audience claims for one tenant.
#[derive(Debug, Clone)]
pub struct ClaimValidator {
    tenant: TenantConfig,
    clock_skew: Duration,
}

impl ClaimValidator {
    pub fn new(tenant: TenantConfig, clock_skew: Duration) -> Self {
        Self { tenant, clock_skew }
    }

    pub fn tenant(&self) -> &TenantConfig {
        &self.tenant
    }

    /// Validate claims against the wall clock.
    ///
    /// # Errors
    ///
    /// `TokenExpired`, `TokenNotYetValid`, `InvalidIssuer` or
    /// `InvalidAudience`, checked in that order.
    pub fn validate(&self, claims: &Claims) -> Result<(), AuthError> {
        self.validate_at(claims, chrono::Utc::now().timestamp())
    }

    /// Validate claims against an explicit `now` (Unix seconds).
    pub fn validate_at(&self, claims: &Claims, now: i64) -> Result<(), AuthError> {
        validate_temporal_at(claims.exp, claims.nbf, self.clock_skew, now)?;

        if self.tenant.issuer_kind(&claims.iss).is_none() {
            tracing::debug!(target: "gk.auth.claims", iss = %claims.iss, "Token issuer not accepted");
            return Err(AuthError::InvalidIssuer);
        }

        if !self.tenant.is_allowed_audience(&claims.aud) {
            tracing::debug!(target: "gk.auth.claims", aud = %claims.aud, "Token audience not accepted");
            return Err(AuthError::InvalidAudience);
        }

        Ok(())
    }
}
