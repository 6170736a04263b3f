//! The authorization gate.
//!
//! Runs one request's credentials through every check in order and produces
//! exactly one [`AuthDecision`]:
//!
//! ```text
//! Start -> HeaderExtracted -> Parsed -> ClaimsValid -> KeyResolved
//!       -> SignatureValid -> PermissionChecked -> Authorized
//! ```
//!
//! Any failure short-circuits to a denial. The gate is the only place where
//! failures become decisions; it never retries and never caches decisions.

use crate::auth::claims::Claims;
use crate::auth::groups::{Department, GroupTable};
use crate::auth::jwt::JwtValidator;
use crate::auth::permissions::check_policy;
use crate::auth::policy::AuthorizationPolicy;
use crate::errors::AuthError;
use crate::observability::metrics::record_token_validation;
use common::jwt::extract_bearer_token;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Last state a request reached in the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    Start,
    HeaderExtracted,
    Parsed,
    ClaimsValid,
    KeyResolved,
    SignatureValid,
    PermissionChecked,
    Authorized,
}

impl GateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStage::Start => "start",
            GateStage::HeaderExtracted => "header_extracted",
            GateStage::Parsed => "parsed",
            GateStage::ClaimsValid => "claims_valid",
            GateStage::KeyResolved => "key_resolved",
            GateStage::SignatureValid => "signature_valid",
            GateStage::PermissionChecked => "permission_checked",
            GateStage::Authorized => "authorized",
        }
    }
}

impl fmt::Display for GateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped result of a successful gate pass.
///
/// Inserted into the request extensions for downstream handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Verified claims.
    pub claims: Claims,

    /// Department resolved from the token's groups, if any row matched.
    pub department: Option<Department>,
}

/// Outcome of one gate evaluation.
#[derive(Debug, Clone)]
pub enum AuthDecision {
    Authorized(AuthContext),
    Unauthenticated(AuthError),
    Forbidden(AuthError),
}

impl AuthDecision {
    /// Classify a failure.
    pub fn denied(err: AuthError) -> Self {
        if err.is_forbidden() {
            AuthDecision::Forbidden(err)
        } else {
            AuthDecision::Unauthenticated(err)
        }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthDecision::Authorized(_))
    }

    /// HTTP status for this decision.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthDecision::Authorized(_) => 200,
            AuthDecision::Unauthenticated(err) | AuthDecision::Forbidden(err) => err.status_code(),
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            AuthDecision::Authorized(_) => "authorized",
            AuthDecision::Unauthenticated(_) => "unauthenticated",
            AuthDecision::Forbidden(_) => "forbidden",
        }
    }

    pub fn into_result(self) -> Result<AuthContext, AuthError> {
        match self {
            AuthDecision::Authorized(context) => Ok(context),
            AuthDecision::Unauthenticated(err) | AuthDecision::Forbidden(err) => Err(err),
        }
    }
}

/// Orchestrates token validation, policy checks and group resolution.
///
/// Cheap to share: hold it in an `Arc` and hand one to every protected
/// route.
pub struct AuthGate {
    validator: Arc<JwtValidator>,
    group_table: Arc<GroupTable>,
}

impl AuthGate {
    pub fn new(validator: Arc<JwtValidator>, group_table: Arc<GroupTable>) -> Self {
        Self {
            validator,
            group_table,
        }
    }

    /// Evaluate an `Authorization` header value against `policy`.
    ///
    /// `None` means the header was absent or not valid visible ASCII.
    #[instrument(skip_all, name = "gk.auth.gate")]
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        policy: &AuthorizationPolicy,
    ) -> AuthDecision {
        let start = Instant::now();
        let mut stage = GateStage::Start;

        let decision = match self.run(authorization, policy, &mut stage).await {
            Ok(context) => AuthDecision::Authorized(context),
            Err(err) => {
                tracing::debug!(
                    target: "gk.auth.gate",
                    stage = %stage,
                    error = err.code(),
                    "Request denied"
                );
                AuthDecision::denied(err)
            }
        };

        let error_type = match &decision {
            AuthDecision::Authorized(_) => None,
            AuthDecision::Unauthenticated(err) | AuthDecision::Forbidden(err) => Some(err.code()),
        };
        record_token_validation(decision.outcome(), error_type, start.elapsed());

        decision
    }

    async fn run(
        &self,
        authorization: Option<&str>,
        policy: &AuthorizationPolicy,
        stage: &mut GateStage,
    ) -> Result<AuthContext, AuthError> {
        let header_value = authorization.ok_or_else(|| {
            tracing::debug!(target: "gk.auth.gate", "Missing Authorization header");
            AuthError::MalformedToken
        })?;
        let token = extract_bearer_token(header_value)?;
        *stage = GateStage::HeaderExtracted;

        let claims = self.validator.validate_tracked(token, stage).await?;

        check_policy(&claims, policy)?;
        *stage = GateStage::PermissionChecked;

        let department = self.group_table.resolve(claims.groups());
        *stage = GateStage::Authorized;

        Ok(AuthContext { claims, department })
    }
}
