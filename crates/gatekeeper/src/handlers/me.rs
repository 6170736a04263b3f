//! Current caller handler.
//!
//! Echoes the authorization-relevant parts of the verified token. Personal
//! identifiers (`sub`, `oid`, names) are deliberately left out.

use crate::auth::{AuthContext, Department};
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Audience the token was issued for.
    pub aud: String,

    pub scopes: Vec<String>,

    pub roles: Vec<String>,

    /// Department resolved from group membership.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<Department>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Handler for GET /api/v1/me
///
/// Requires the auth layer.
///
/// ```json
/// {
///   "aud": "api://7f1c...",
///   "scopes": ["access_as_user"],
///   "roles": [],
///   "department": { "location": "Berlin", "role": "Staff" },
///   "exp": 1234567890
/// }
/// ```
#[instrument(skip_all, name = "gk.handlers.me")]
pub async fn get_me(Extension(context): Extension<AuthContext>) -> Json<MeResponse> {
    tracing::debug!(target: "gk.handlers.me", "Returning caller summary");

    let AuthContext { claims, department } = context;
    let scopes = claims.scopes().iter().map(ToString::to_string).collect();
    let roles = claims.roles().to_vec();

    Json(MeResponse {
        aud: claims.aud,
        scopes,
        roles,
        department,
        exp: claims.exp,
    })
}
