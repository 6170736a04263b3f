//! Gatekeeper error types.
//!
//! `AuthError` is the complete public failure taxonomy of the gate. Every
//! internal failure (header parsing, JWKS fetch, signature check, policy) is
//! converted into one of these variants before it leaves the gate, and the
//! only text ever returned to a caller is the variant's machine code.
//! Underlying causes are logged server-side.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::jwt::JwtValidationError;
use serde::Serialize;
use thiserror::Error;

/// Authentication / authorization failure.
///
/// Maps to HTTP status codes:
/// - InsufficientPermissions: 403 Forbidden
/// - everything else (including Internal): 401 Unauthorized
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token not yet valid")]
    TokenNotYetValid,

    #[error("Invalid issuer")]
    InvalidIssuer,

    #[error("Invalid audience")]
    InvalidAudience,

    #[error("JWKS unavailable")]
    JwksUnavailable,

    #[error("Signing key not found")]
    SigningKeyNotFound,

    #[error("Unsupported algorithm")]
    UnsupportedAlgorithm,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// Unclassified failure. Fails closed as 401.
    #[error("Internal authentication error")]
    Internal,
}

impl AuthError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InsufficientPermissions => 403,
            _ => 401,
        }
    }

    /// Machine-oriented reason code exposed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "MalformedToken",
            AuthError::TokenExpired => "TokenExpired",
            AuthError::TokenNotYetValid => "TokenNotYetValid",
            AuthError::InvalidIssuer => "InvalidIssuer",
            AuthError::InvalidAudience => "InvalidAudience",
            AuthError::JwksUnavailable => "JWKSUnavailable",
            AuthError::SigningKeyNotFound => "SigningKeyNotFound",
            AuthError::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            AuthError::InvalidSignature => "InvalidSignature",
            AuthError::InsufficientPermissions => "InsufficientPermissions",
            AuthError::Internal => "Unauthenticated",
        }
    }

    /// True if the failure is an authorization (policy) failure rather than
    /// an authentication failure.
    pub fn is_forbidden(&self) -> bool {
        self.status_code() == 403
    }
}

impl From<JwtValidationError> for AuthError {
    fn from(err: JwtValidationError) -> Self {
        match err {
            JwtValidationError::TokenTooLarge
            | JwtValidationError::MalformedToken
            | JwtValidationError::MissingKid => AuthError::MalformedToken,
            JwtValidationError::TokenExpired => AuthError::TokenExpired,
            JwtValidationError::TokenNotYetValid => AuthError::TokenNotYetValid,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = if self.is_forbidden() {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        };

        let mut response = (status, Json(ErrorResponse { error: self.code() })).into_response();

        let challenge = if self.is_forbidden() {
            "Bearer realm=\"gatekeeper\", error=\"insufficient_scope\""
        } else {
            "Bearer realm=\"gatekeeper\", error=\"invalid_token\""
        };
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    // Helper function to read the response body as JSON
    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const AUTHENTICATION_FAILURES: [AuthError; 10] = [
        AuthError::MalformedToken,
        AuthError::TokenExpired,
        AuthError::TokenNotYetValid,
        AuthError::InvalidIssuer,
        AuthError::InvalidAudience,
        AuthError::JwksUnavailable,
        AuthError::SigningKeyNotFound,
        AuthError::UnsupportedAlgorithm,
        AuthError::InvalidSignature,
        AuthError::Internal,
    ];

    #[test]
    fn test_status_codes() {
        for err in AUTHENTICATION_FAILURES {
            assert_eq!(err.status_code(), 401, "{err:?} should map to 401");
            assert!(!err.is_forbidden());
        }
        assert_eq!(AuthError::InsufficientPermissions.status_code(), 403);
        assert!(AuthError::InsufficientPermissions.is_forbidden());
    }

    #[test]
    fn test_codes_match_taxonomy() {
        assert_eq!(AuthError::MalformedToken.code(), "MalformedToken");
        assert_eq!(AuthError::JwksUnavailable.code(), "JWKSUnavailable");
        assert_eq!(AuthError::InsufficientPermissions.code(), "InsufficientPermissions");
        assert_eq!(AuthError::Internal.code(), "Unauthenticated");
    }

    #[test]
    fn test_from_jwt_validation_error() {
        assert_eq!(
            AuthError::from(JwtValidationError::TokenTooLarge),
            AuthError::MalformedToken
        );
        assert_eq!(
            AuthError::from(JwtValidationError::MissingKid),
            AuthError::MalformedToken
        );
        assert_eq!(
            AuthError::from(JwtValidationError::MalformedToken),
            AuthError::MalformedToken
        );
        assert_eq!(
            AuthError::from(JwtValidationError::TokenExpired),
            AuthError::TokenExpired
        );
        assert_eq!(
            AuthError::from(JwtValidationError::TokenNotYetValid),
            AuthError::TokenNotYetValid
        );
    }

    #[test]
    fn test_display_is_generic() {
        assert_eq!(format!("{}", AuthError::InvalidSignature), "Invalid signature");
        assert_eq!(format!("{}", AuthError::Internal), "Internal authentication error");
    }

    #[tokio::test]
    async fn test_into_response_unauthenticated() {
        let response = AuthError::TokenExpired.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("Bearer realm=\"gatekeeper\""));
        assert!(www_auth.contains("invalid_token"));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json, serde_json::json!({ "error": "TokenExpired" }));
    }

    #[tokio::test]
    async fn test_into_response_forbidden() {
        let response = AuthError::InsufficientPermissions.into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let www_auth = response
            .headers()
            .get("WWW-Authenticate")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("insufficient_scope"));

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "InsufficientPermissions");
    }

    #[tokio::test]
    async fn test_into_response_internal_fails_closed() {
        let response = AuthError::Internal.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "Unauthenticated");
    }
}
