//! Permission evaluation against an authorization policy.
//!
//! Scope and role requirements are ANDed together, each one any-of. Group
//! requirements are a third any-of clause whose ids are compared
//! case-insensitively, since directory object ids are GUIDs that different
//! tools render in different cases. Scope and role names are exact.

use crate::auth::claims::Claims;
use crate::auth::policy::AuthorizationPolicy;
use crate::errors::AuthError;

/// Check scopes and roles.
///
/// # Errors
///
/// `InsufficientPermissions` if a non-empty scope or role requirement has no
/// match in the token.
pub fn evaluate_permissions(claims: &Claims, policy: &AuthorizationPolicy) -> Result<(), AuthError> {
    let required_scopes = policy.scopes_any();
    let required_roles = policy.roles_any();

    if required_scopes.is_empty() && required_roles.is_empty() {
        return Ok(());
    }

    let scopes_ok = required_scopes.is_empty()
        || claims
            .scopes()
            .iter()
            .any(|scope| required_scopes.contains(*scope));

    let roles_ok = required_roles.is_empty()
        || claims
            .roles()
            .iter()
            .any(|role| required_roles.contains(role));

    if scopes_ok && roles_ok {
        Ok(())
    } else {
        tracing::debug!(
            target: "gk.auth.permissions",
            scopes_ok = scopes_ok,
            roles_ok = roles_ok,
            "Scope/role requirement not met"
        );
        Err(AuthError::InsufficientPermissions)
    }
}

/// Check group membership.
///
/// # Errors
///
/// `InsufficientPermissions` if a non-empty group requirement has no
/// (case-insensitive) match in the token's `groups`.
pub fn evaluate_groups(claims: &Claims, policy: &AuthorizationPolicy) -> Result<(), AuthError> {
    let required = policy.groups_any();
    if required.is_empty() {
        return Ok(());
    }

    let member = claims.groups().iter().any(|group| {
        required
            .iter()
            .any(|wanted| wanted.eq_ignore_ascii_case(group))
    });

    if member {
        Ok(())
    } else {
        tracing::debug!(target: "gk.auth.permissions", "Group requirement not met");
        Err(AuthError::InsufficientPermissions)
    }
}

/// Evaluate the whole policy: scopes and roles, then groups.
pub fn check_policy(claims: &Claims, policy: &AuthorizationPolicy) -> Result<(), AuthError> {
    evaluate_permissions(claims, policy)?;
    evaluate_groups(claims, policy)
}
