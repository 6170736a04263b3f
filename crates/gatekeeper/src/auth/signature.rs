//! RS256 signature verification.
//!
//! The algorithm is pinned: the header's `alg` must be exactly `RS256`
//! before any cryptographic work happens, which rules out `none`, the HMAC
//! family and algorithm-confusion attacks against the RSA key. Verification
//! looks only at bytes and never at claims.

use crate::auth::jwks::RsaPublicKey;
use crate::errors::AuthError;
use common::jwt::JwtHeader;
use ring::signature::{RsaPublicKeyComponents, RSA_PKCS1_2048_8192_SHA256};

/// The only accepted JWS algorithm.
pub const EXPECTED_ALGORITHM: &str = "RS256";

/// Check the header algorithm.
///
/// # Errors
///
/// `UnsupportedAlgorithm` for anything other than `RS256`.
pub fn check_algorithm(header: &JwtHeader) -> Result<(), AuthError> {
    if header.alg == EXPECTED_ALGORITHM {
        Ok(())
    } else {
        tracing::debug!(target: "gk.auth.signature", alg = %header.alg, "Rejected token algorithm");
        Err(AuthError::UnsupportedAlgorithm)
    }
}

/// Verify an RS256 signature over `signing_input`.
///
/// # Errors
///
/// - `UnsupportedAlgorithm` if the header does not declare `RS256`
/// - `InvalidSignature` if the signature does not verify under `key`
pub fn verify_signature(
    header: &JwtHeader,
    signing_input: &str,
    signature: &[u8],
    key: &RsaPublicKey,
) -> Result<(), AuthError> {
    check_algorithm(header)?;

    let public_key = RsaPublicKeyComponents {
        n: key.n.as_slice(),
        e: key.e.as_slice(),
    };

    public_key
        .verify(&RSA_PKCS1_2048_8192_SHA256, signing_input.as_bytes(), signature)
        .map_err(|_| {
            tracing::debug!(target: "gk.auth.signature", kid = %key.kid, "Signature verification failed");
            AuthError::InvalidSignature
        })
}
