//! Builders for directory-style access tokens
//!
//! Claims default to a token that the gate accepts: v2 issuer for
//! [`TEST_TENANT_ID`], audience [`TEST_CLIENT_ID`], valid for an hour.
//! Individual claims are then bent to exercise one failure at a time.

use crate::crypto_fixtures::TestKeypair;
use chrono::Utc;
use serde_json::{json, Map, Value};

/// Tenant id used throughout the test suites.
pub const TEST_TENANT_ID: &str = "11111111-2222-3333-4444-555555555555";

/// Application (client) id the gate is configured for in tests.
pub const TEST_CLIENT_ID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

/// Authority host used when no mock server is involved.
pub const DEFAULT_TEST_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Host of the legacy token service issuer.
pub const DEFAULT_TEST_STS_HOST: &str = "https://sts.windows.net";

/// Builder for token claims.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .issued_by(&jwks.v2_issuer())
///     .with_scope("access_as_user")
///     .sign(&TestKeypair::primary());
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    iss: String,
    aud: String,
    sub: String,
    exp: Option<i64>,
    nbf: Option<i64>,
    iat: i64,
    scp: Option<String>,
    roles: Option<Vec<String>>,
    groups: Option<Vec<String>>,
    extra: Map<String, Value>,
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTokenBuilder {
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            iss: format!("{DEFAULT_TEST_AUTHORITY_HOST}/{TEST_TENANT_ID}/v2.0"),
            aud: TEST_CLIENT_ID.to_string(),
            sub: "test-subject".to_string(),
            exp: Some(now + 3600),
            nbf: Some(now - 60),
            iat: now,
            scp: None,
            roles: None,
            groups: None,
            extra: Map::new(),
        }
    }

    pub fn issued_by(mut self, iss: &str) -> Self {
        self.iss = iss.to_string();
        self
    }

    pub fn for_audience(mut self, aud: &str) -> Self {
        self.aud = aud.to_string();
        self
    }

    pub fn subject(mut self, sub: &str) -> Self {
        self.sub = sub.to_string();
        self
    }

    /// Space-separated delegated scopes, as the `scp` claim carries them.
    pub fn with_scope(mut self, scp: &str) -> Self {
        self.scp = Some(scp.to_string());
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = Some(roles.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn with_groups(mut self, groups: &[&str]) -> Self {
        self.groups = Some(groups.iter().map(|g| g.to_string()).collect());
        self
    }

    /// Absolute expiry (unix seconds).
    pub fn expires_at(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn expired_seconds_ago(self, seconds: i64) -> Self {
        let exp = Utc::now().timestamp() - seconds;
        self.expires_at(exp)
    }

    /// Absolute not-before (unix seconds).
    pub fn not_before(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    pub fn without_exp(mut self) -> Self {
        self.exp = None;
        self
    }

    pub fn without_nbf(mut self) -> Self {
        self.nbf = None;
        self
    }

    /// Add or override an arbitrary claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// The claims object.
    pub fn build(&self) -> Value {
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(self.iss));
        claims.insert("aud".to_string(), json!(self.aud));
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(exp) = self.exp {
            claims.insert("exp".to_string(), json!(exp));
        }
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(scp) = &self.scp {
            claims.insert("scp".to_string(), json!(scp));
        }
        if let Some(roles) = &self.roles {
            claims.insert("roles".to_string(), json!(roles));
        }
        if let Some(groups) = &self.groups {
            claims.insert("groups".to_string(), json!(groups));
        }
        for (name, value) in &self.extra {
            claims.insert(name.clone(), value.clone());
        }
        Value::Object(claims)
    }

    /// Sign with `keypair` under its own key id.
    pub fn sign(&self, keypair: &TestKeypair) -> String {
        keypair.sign_json(&self.build())
    }

    /// Sign with `keypair` while declaring `kid` in the header.
    pub fn sign_as(&self, keypair: &TestKeypair, kid: &str) -> String {
        keypair.sign_with_kid(&self.build(), kid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_for_test_tenant() {
        let claims = TestTokenBuilder::new().build();

        assert_eq!(
            claims["iss"],
            format!("https://login.microsoftonline.com/{TEST_TENANT_ID}/v2.0")
        );
        assert_eq!(claims["aud"], TEST_CLIENT_ID);
        assert!(claims["exp"].as_i64().unwrap() > Utc::now().timestamp());
        assert!(claims.get("scp").is_none());
    }

    #[test]
    fn test_optional_claims() {
        let claims = TestTokenBuilder::new()
            .with_scope("access_as_user profile")
            .with_roles(&["Reader"])
            .with_groups(&["g-1", "g-2"])
            .without_exp()
            .claim("name", json!("Test User"))
            .build();

        assert_eq!(claims["scp"], "access_as_user profile");
        assert_eq!(claims["roles"], json!(["Reader"]));
        assert_eq!(claims["groups"].as_array().unwrap().len(), 2);
        assert!(claims.get("exp").is_none());
        assert_eq!(claims["name"], "Test User");
    }

    #[test]
    fn test_expired_seconds_ago() {
        let claims = TestTokenBuilder::new().expired_seconds_ago(10_000).build();
        assert!(claims["exp"].as_i64().unwrap() < Utc::now().timestamp() - 9_000);
    }
}
