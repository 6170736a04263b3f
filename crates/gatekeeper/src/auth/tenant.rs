//! Tenant-derived identity expectations.
//!
//! A single directory tenant issues tokens in two shapes: the v2.0 endpoint
//! issuer and the legacy security-token-service issuer. Both are accepted.
//! Each shape publishes its signing keys at its own discovery path, so the
//! issuer claim decides which JWKS URI a token's key is resolved from.

/// Default authority host for v2.0 issuers and all discovery documents.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Default host of the legacy security token service issuer.
pub const DEFAULT_STS_HOST: &str = "https://sts.windows.net";

/// Which of the two accepted issuer shapes a token carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerKind {
    /// `{authority}/{tenant}/v2.0`
    V2,
    /// `{sts}/{tenant}/`
    Legacy,
}

/// Identity expectations for one tenant and one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    tenant_id: String,
    client_id: String,
    authority_host: String,
    sts_host: String,
}

impl TenantConfig {
    /// Create a tenant configuration against the public cloud hosts.
    pub fn new(tenant_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self::with_hosts(tenant_id, client_id, DEFAULT_AUTHORITY_HOST, DEFAULT_STS_HOST)
    }

    /// Create a tenant configuration with explicit hosts.
    ///
    /// Trailing slashes on the hosts are ignored.
    pub fn with_hosts(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        authority_host: impl Into<String>,
        sts_host: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            authority_host: authority_host.into().trim_end_matches('/').to_string(),
            sts_host: sts_host.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Issuer of tokens minted by the v2.0 endpoint.
    pub fn v2_issuer(&self) -> String {
        format!("{}/{}/v2.0", self.authority_host, self.tenant_id)
    }

    /// Issuer of tokens minted by the legacy token service.
    pub fn legacy_issuer(&self) -> String {
        format!("{}/{}/", self.sts_host, self.tenant_id)
    }

    /// Classify an `iss` claim. Exact string match only.
    pub fn issuer_kind(&self, iss: &str) -> Option<IssuerKind> {
        if iss == self.v2_issuer() {
            Some(IssuerKind::V2)
        } else if iss == self.legacy_issuer() {
            Some(IssuerKind::Legacy)
        } else {
            None
        }
    }

    /// JWKS URI publishing the keys for the given issuer shape.
    pub fn jwks_uri(&self, kind: IssuerKind) -> String {
        match kind {
            IssuerKind::V2 => format!(
                "{}/{}/discovery/v2.0/keys",
                self.authority_host, self.tenant_id
            ),
            IssuerKind::Legacy => {
                format!("{}/{}/discovery/keys", self.authority_host, self.tenant_id)
            }
        }
    }

    /// JWKS URI for an `iss` claim, or `None` if the issuer is not accepted.
    pub fn jwks_uri_for_issuer(&self, iss: &str) -> Option<String> {
        self.issuer_kind(iss).map(|kind| self.jwks_uri(kind))
    }

    /// Audiences accepted for this application: the bare client id and its
    /// `api://` application id URI.
    pub fn allowed_audiences(&self) -> [String; 2] {
        [self.client_id.clone(), format!("api://{}", self.client_id)]
    }

    pub fn is_allowed_audience(&self, aud: &str) -> bool {
        self.allowed_audiences().iter().any(|allowed| allowed == aud)
    }
}
