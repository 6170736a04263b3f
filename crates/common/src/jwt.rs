//! JWT primitives shared by the gatekeeper crates.
//!
//! This module provides the provider-neutral pieces of bearer-token handling:
//! - Size limits for DoS prevention
//! - Clock skew constants for temporal validation
//! - `Authorization` header parsing (`Bearer <token>`)
//! - Compact JWS parsing into header, claims, signing input and signature bytes
//! - `exp` / `nbf` validation with clock skew tolerance
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Parsing never verifies anything: claims returned by [`parse_token`] are
//!   untrusted until the signature over [`ParsedToken::signing_input`] has been
//!   verified by the caller
//! - Generic error messages prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{extract_bearer_token, parse_token, validate_temporal, DEFAULT_CLOCK_SKEW};
//!
//! let token = extract_bearer_token(header_value)?;
//! let parsed: ParsedToken<MyClaims> = parse_token(token)?;
//! validate_temporal(parsed.claims.exp, parsed.claims.nbf, DEFAULT_CLOCK_SKEW)?;
//! // ... resolve parsed.header.kid and verify parsed.signature ...
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens larger than this are rejected before any base64 decoding or JSON
/// parsing. Typical access tokens are 1-2KB; the limit leaves room for large
/// group claims while bounding allocation per request.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
///
/// Configuration above this value is rejected at startup.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Authentication scheme expected in the `Authorization` header.
const BEARER_SCHEME: &str = "Bearer";

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced by the JWT primitives.
///
/// Note: Display messages are intentionally generic. Detailed information is
/// logged at debug level under the `common.jwt` target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Header value or token is not a well-formed bearer JWT.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token header has no usable `kid`.
    #[error("The access token is invalid or expired")]
    MissingKid,

    /// `exp` is in the past beyond the clock skew tolerance.
    #[error("The access token is invalid or expired")]
    TokenExpired,

    /// `nbf` is in the future beyond the clock skew tolerance.
    #[error("The access token is invalid or expired")]
    TokenNotYetValid,
}

// =============================================================================
// Token Types
// =============================================================================

/// Decoded JOSE header.
///
/// Only the fields used to select and check a verification key are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtHeader {
    /// Signature algorithm as written by the issuer (e.g. `RS256`).
    pub alg: String,

    /// Key identifier used to look the verification key up in a JWKS.
    pub kid: String,

    /// Optional media type (usually `JWT`).
    pub typ: Option<String>,
}

/// A compact JWS split into its decoded parts.
///
/// The claims are **untrusted**: nothing in this struct has been verified.
#[derive(Debug, Clone)]
pub struct ParsedToken<C> {
    /// Decoded header.
    pub header: JwtHeader,

    /// Decoded payload.
    pub claims: C,

    /// The exact `header.payload` segments the signature was computed over.
    pub signing_input: String,

    /// Raw signature bytes (base64url-decoded third segment).
    pub signature: Vec<u8>,
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>` with a case-insensitive scheme. Surrounding
/// whitespace around the token is ignored.
///
/// # Errors
///
/// Returns `JwtValidationError::MalformedToken` if the scheme is not `Bearer`
/// or the token part is empty.
pub fn extract_bearer_token(header_value: &str) -> Result<&str, JwtValidationError> {
    let Some((scheme, token)) = header_value.trim_start().split_once(' ') else {
        tracing::debug!(target: "common.jwt", "Authorization header has no scheme separator");
        return Err(JwtValidationError::MalformedToken);
    };

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        tracing::debug!(target: "common.jwt", "Authorization header scheme is not Bearer");
        return Err(JwtValidationError::MalformedToken);
    }

    let token = token.trim();
    if token.is_empty() {
        tracing::debug!(target: "common.jwt", "Authorization header has empty bearer token");
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(token)
}

/// Parse a compact JWS without verifying it.
///
/// # Security
///
/// - Token size is checked BEFORE any decoding (denial-of-service prevention)
/// - This function does NOT validate the signature or any claim
/// - The header and payload must both be JSON objects
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - not exactly three non-empty segments, bad base64url,
///   header/payload not a JSON object, payload does not match `C`, or `alg`
///   missing
/// - `MissingKid` - header has no non-empty string `kid`
pub fn parse_token<C: DeserializeOwned>(token: &str) -> Result<ParsedToken<C>, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut segments = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        tracing::debug!(target: "common.jwt", "Token rejected: not three segments");
        return Err(JwtValidationError::MalformedToken);
    };

    if header_b64.is_empty() || payload_b64.is_empty() || signature_b64.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty segment");
        return Err(JwtValidationError::MalformedToken);
    }

    let header = decode_header(header_b64)?;
    let claims = decode_payload(payload_b64)?;

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT signature base64");
        JwtValidationError::MalformedToken
    })?;

    let signing_input = token
        .get(..header_b64.len() + 1 + payload_b64.len())
        .ok_or(JwtValidationError::MalformedToken)?
        .to_string();

    Ok(ParsedToken {
        header,
        claims,
        signing_input,
        signature,
    })
}

fn decode_json_object(segment: &str) -> Result<serde_json::Value, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT segment base64");
        JwtValidationError::MalformedToken
    })?;

    let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT segment JSON");
        JwtValidationError::MalformedToken
    })?;

    if !value.is_object() {
        tracing::debug!(target: "common.jwt", "JWT segment is not a JSON object");
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(value)
}

fn decode_header(segment: &str) -> Result<JwtHeader, JwtValidationError> {
    let value = decode_json_object(segment)?;

    let alg = value
        .get("alg")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "common.jwt", "JWT header missing alg");
            JwtValidationError::MalformedToken
        })?;

    // Reject empty kid values as well as missing/non-string ones
    let kid = value
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    let typ = value
        .get("typ")
        .and_then(|v| v.as_str())
        .map(ToString::to_string);

    Ok(JwtHeader { alg, kid, typ })
}

fn decode_payload<C: DeserializeOwned>(segment: &str) -> Result<C, JwtValidationError> {
    let value = decode_json_object(segment)?;

    serde_json::from_value(value).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "JWT payload does not match claims shape");
        JwtValidationError::MalformedToken
    })
}

/// Validate the `exp` / `nbf` claims with clock skew tolerance.
///
/// Absent claims impose no constraint.
///
/// # Errors
///
/// - `TokenExpired` if `now > exp + clock_skew`
/// - `TokenNotYetValid` if `now + clock_skew < nbf`
pub fn validate_temporal(
    exp: Option<i64>,
    nbf: Option<i64>,
    clock_skew: Duration,
) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_temporal_at(exp, nbf, clock_skew, now)
}

/// Deterministic temporal validation against an explicit `now` timestamp.
///
/// Prefer [`validate_temporal`] in production code. This variant exists so
/// boundary conditions can be tested without wall-clock dependence.
///
/// # Errors
///
/// See [`validate_temporal`].
pub fn validate_temporal_at(
    exp: Option<i64>,
    nbf: Option<i64>,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW by configuration
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;

    if let Some(exp) = exp {
        if now > exp.saturating_add(clock_skew_secs) {
            tracing::debug!(
                target: "common.jwt",
                exp = exp,
                now = now,
                clock_skew_secs = clock_skew_secs,
                "Token rejected: expired"
            );
            return Err(JwtValidationError::TokenExpired);
        }
    }

    if let Some(nbf) = nbf {
        if now.saturating_add(clock_skew_secs) < nbf {
            tracing::debug!(
                target: "common.jwt",
                nbf = nbf,
                now = now,
                clock_skew_secs = clock_skew_secs,
                "Token rejected: not yet valid"
            );
            return Err(JwtValidationError::TokenNotYetValid);
        }
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestClaims {
        sub: String,
        #[serde(default)]
        exp: Option<i64>,
    }

    fn encode_json(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    fn token_with(header: &str, payload: &str, signature: &[u8]) -> String {
        format!(
            "{}.{}.{}",
            encode_json(header),
            encode_json(payload),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    const HEADER: &str = r#"{"alg":"RS256","typ":"JWT","kid":"key-1"}"#;
    const PAYLOAD: &str = r#"{"sub":"alice","exp":1700000000}"#;

    // -------------------------------------------------------------------------
    // Constants Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    #[test]
    fn test_max_clock_skew_is_10_minutes() {
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // extract_bearer_token Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_extract_bearer_token_valid() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi").unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_extract_bearer_token_scheme_is_case_insensitive() {
        assert_eq!(extract_bearer_token("bearer abc").unwrap(), "abc");
        assert_eq!(extract_bearer_token("BEARER abc").unwrap(), "abc");
    }

    #[test]
    fn test_extract_bearer_token_rejects_other_schemes() {
        assert_eq!(
            extract_bearer_token("Token abc"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            extract_bearer_token("Basic dXNlcjpwYXNz"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_extract_bearer_token_rejects_missing_token() {
        assert_eq!(
            extract_bearer_token("Bearer"),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(
            extract_bearer_token("Bearer    "),
            Err(JwtValidationError::MalformedToken)
        );
        assert_eq!(extract_bearer_token(""), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_extract_bearer_token_rejects_prefix_without_separator() {
        // "Bearerabc" must not be read as scheme "Bearer" + token "abc"
        assert_eq!(
            extract_bearer_token("Bearerabc"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    // -------------------------------------------------------------------------
    // parse_token Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_token_valid() {
        let token = token_with(HEADER, PAYLOAD, b"sig-bytes");

        let parsed: ParsedToken<TestClaims> = parse_token(&token).unwrap();

        assert_eq!(parsed.header.alg, "RS256");
        assert_eq!(parsed.header.kid, "key-1");
        assert_eq!(parsed.header.typ.as_deref(), Some("JWT"));
        assert_eq!(parsed.claims.sub, "alice");
        assert_eq!(parsed.claims.exp, Some(1_700_000_000));
        assert_eq!(parsed.signature, b"sig-bytes".to_vec());
    }

    #[test]
    fn test_parse_token_signing_input_is_first_two_segments() {
        let token = token_with(HEADER, PAYLOAD, b"sig");
        let parsed: ParsedToken<TestClaims> = parse_token(&token).unwrap();

        let expected = format!("{}.{}", encode_json(HEADER), encode_json(PAYLOAD));
        assert_eq!(parsed.signing_input, expected);
    }

    #[test]
    fn test_parse_token_wrong_segment_count() {
        for token in ["", "single", "only.two", "a.b.c.d", "not.a.valid.jwt"] {
            let result: Result<ParsedToken<TestClaims>, _> = parse_token(token);
            assert_eq!(
                result.unwrap_err(),
                JwtValidationError::MalformedToken,
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_parse_token_empty_segment() {
        let token = format!("{}..{}", encode_json(HEADER), URL_SAFE_NO_PAD.encode("sig"));
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);

        let token = format!("{}.{}.", encode_json(HEADER), encode_json(PAYLOAD));
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_parse_token_invalid_base64() {
        let token = format!("!!!invalid!!!.{}.c2ln", encode_json(PAYLOAD));
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);

        let token = format!("{}.{}.!!!", encode_json(HEADER), encode_json(PAYLOAD));
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_parse_token_invalid_json() {
        let token = format!("{}.{}.c2ln", encode_json("not-json"), encode_json(PAYLOAD));
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_parse_token_payload_must_be_object() {
        let token = token_with(HEADER, r#"["alice", 1700000000]"#, b"sig");
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_parse_token_payload_shape_mismatch() {
        // sub must be a string
        let token = token_with(HEADER, r#"{"sub":42}"#, b"sig");
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_parse_token_missing_alg() {
        let token = token_with(r#"{"kid":"key-1"}"#, PAYLOAD, b"sig");
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        assert_eq!(result.unwrap_err(), JwtValidationError::MalformedToken);
    }

    #[test]
    fn test_parse_token_missing_or_empty_kid() {
        for header in [
            r#"{"alg":"RS256"}"#,
            r#"{"alg":"RS256","kid":""}"#,
            r#"{"alg":"RS256","kid":12345}"#,
            r#"{"alg":"RS256","kid":null}"#,
        ] {
            let token = token_with(header, PAYLOAD, b"sig");
            let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
            assert_eq!(
                result.unwrap_err(),
                JwtValidationError::MissingKid,
                "header {header} should be rejected for kid"
            );
        }
    }

    #[test]
    fn test_parse_token_oversized() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&oversized);
        assert_eq!(result.unwrap_err(), JwtValidationError::TokenTooLarge);
    }

    #[test]
    fn test_parse_token_at_size_limit() {
        let header_b64 = encode_json(HEADER);
        let payload_b64 = encode_json(PAYLOAD);
        // Pad the signature segment so the token lands exactly on the limit
        let sig_len = MAX_JWT_SIZE_BYTES - header_b64.len() - payload_b64.len() - 2;
        let token = format!("{}.{}.{}", header_b64, payload_b64, "A".repeat(sig_len));
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        let result: Result<ParsedToken<TestClaims>, _> = parse_token(&token);
        // "AAAA..." of arbitrary length may not be canonical base64url, but it
        // must never be rejected for size.
        assert_ne!(result.err(), Some(JwtValidationError::TokenTooLarge));
    }

    // -------------------------------------------------------------------------
    // validate_temporal Tests
    // -------------------------------------------------------------------------

    const NOW: i64 = 1_700_000_000;
    const SKEW: Duration = Duration::from_secs(300);

    #[test]
    fn test_validate_temporal_absent_claims_are_unconstrained() {
        assert!(validate_temporal_at(None, None, SKEW, NOW).is_ok());
    }

    #[test]
    fn test_validate_temporal_valid_window() {
        assert!(validate_temporal_at(Some(NOW + 3600), Some(NOW - 60), SKEW, NOW).is_ok());
    }

    #[test]
    fn test_validate_temporal_expired_within_skew_is_accepted() {
        assert!(validate_temporal_at(Some(NOW - 200), None, SKEW, NOW).is_ok());
        // Exactly at exp + skew is still accepted (strict greater-than)
        assert!(validate_temporal_at(Some(NOW - 300), None, SKEW, NOW).is_ok());
    }

    #[test]
    fn test_validate_temporal_expired_beyond_skew() {
        assert_eq!(
            validate_temporal_at(Some(NOW - 301), None, SKEW, NOW),
            Err(JwtValidationError::TokenExpired)
        );
        assert_eq!(
            validate_temporal_at(Some(NOW - 10_000), None, SKEW, NOW),
            Err(JwtValidationError::TokenExpired)
        );
    }

    #[test]
    fn test_validate_temporal_nbf_within_skew_is_accepted() {
        assert!(validate_temporal_at(None, Some(NOW + 300), SKEW, NOW).is_ok());
    }

    #[test]
    fn test_validate_temporal_nbf_beyond_skew() {
        assert_eq!(
            validate_temporal_at(None, Some(NOW + 301), SKEW, NOW),
            Err(JwtValidationError::TokenNotYetValid)
        );
    }

    #[test]
    fn test_validate_temporal_extreme_values_do_not_overflow() {
        assert!(validate_temporal_at(Some(i64::MAX), None, SKEW, NOW).is_ok());
        assert_eq!(
            validate_temporal_at(None, Some(i64::MAX), SKEW, NOW),
            Err(JwtValidationError::TokenNotYetValid)
        );
    }

    #[test]
    fn test_validate_temporal_wall_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_temporal(Some(now + 3600), Some(now), DEFAULT_CLOCK_SKEW).is_ok());
        assert_eq!(
            validate_temporal(Some(now - 3600), None, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::TokenExpired)
        );
    }
}
