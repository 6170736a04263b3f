//! Access token validation.
//!
//! Validates bearer tokens issued by the configured tenant, using RSA keys
//! fetched from the tenant's JWKS endpoints.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only RS256 is accepted, and the algorithm is checked before any key
//!   fetch so `none`/HMAC tokens never cause network I/O
//! - Temporal, issuer and audience claims are checked before key resolution
//!   because the issuer selects the JWKS URI
//! - Claims are returned only after the signature has verified

use crate::auth::claims::{ClaimValidator, Claims};
use crate::auth::gate::GateStage;
use crate::auth::jwks::JwksClient;
use crate::auth::signature::{check_algorithm, verify_signature};
use crate::errors::AuthError;
use common::jwt::parse_token;
use std::sync::Arc;
use tracing::instrument;

/// Token validator for one tenant.
pub struct JwtValidator {
    jwks_client: Arc<JwksClient>,
    claim_validator: ClaimValidator,
}

impl JwtValidator {
    /// Create a validator sharing `jwks_client`'s tenant and key cache.
    pub fn new(jwks_client: Arc<JwksClient>, clock_skew: std::time::Duration) -> Self {
        let claim_validator = ClaimValidator::new(jwks_client.tenant().clone(), clock_skew);
        Self {
            jwks_client,
            claim_validator,
        }
    }

    /// Validate a raw compact token and return its verified claims.
    ///
    /// # Errors
    ///
    /// Any authentication kind of `AuthError`; never `InsufficientPermissions`.
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut stage = GateStage::HeaderExtracted;
        self.validate_tracked(token, &mut stage).await
    }

    /// Validate a token, recording in `stage` the last step that succeeded.
    #[instrument(skip_all)]
    pub(crate) async fn validate_tracked(
        &self,
        token: &str,
        stage: &mut GateStage,
    ) -> Result<Claims, AuthError> {
        let parsed = parse_token::<Claims>(token)?;
        *stage = GateStage::Parsed;

        self.claim_validator.validate(&parsed.claims)?;
        *stage = GateStage::ClaimsValid;

        check_algorithm(&parsed.header)?;
        let key = self
            .jwks_client
            .resolve_key(&parsed.claims.iss, &parsed.header.kid)
            .await?;
        *stage = GateStage::KeyResolved;

        verify_signature(&parsed.header, &parsed.signing_input, &parsed.signature, &key)?;
        *stage = GateStage::SignatureValid;

        tracing::debug!(target: "gk.auth.jwt", kid = %parsed.header.kid, "Token validated successfully");
        Ok(parsed.claims)
    }
}
