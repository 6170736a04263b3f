//! Mock tenant key directory
//!
//! Wraps a wiremock server that answers on the tenant's v2 and legacy
//! discovery paths. Point the gate's authority host at
//! [`MockJwks::authority_host`] and issue tokens for
//! [`MockJwks::v2_issuer`] or [`MockJwks::legacy_issuer`].
//!
//! Call counts registered with the `*_expecting` helpers are verified when
//! the harness is dropped.

use crate::crypto_fixtures::TestKeypair;
use crate::token_builders::{DEFAULT_TEST_STS_HOST, TEST_TENANT_ID};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct MockJwks {
    server: MockServer,
}

impl MockJwks {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// The underlying wiremock server, for custom mocks.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn authority_host(&self) -> String {
        self.server.uri()
    }

    /// Legacy issuer host. Never contacted, so it stays the real one.
    pub fn sts_host(&self) -> String {
        DEFAULT_TEST_STS_HOST.to_string()
    }

    pub fn v2_issuer(&self) -> String {
        format!("{}/{}/v2.0", self.server.uri(), TEST_TENANT_ID)
    }

    pub fn legacy_issuer(&self) -> String {
        format!("{}/{}/", DEFAULT_TEST_STS_HOST, TEST_TENANT_ID)
    }

    pub fn v2_keys_path() -> String {
        format!("/{TEST_TENANT_ID}/discovery/v2.0/keys")
    }

    pub fn legacy_keys_path() -> String {
        format!("/{TEST_TENANT_ID}/discovery/keys")
    }

    /// JWKS document publishing `keys`.
    pub fn document(keys: &[&TestKeypair]) -> Value {
        json!({ "keys": keys.iter().map(|k| k.jwk_json()).collect::<Vec<_>>() })
    }

    /// Publish `keys` on both discovery paths, any number of times.
    pub async fn serve_keys(&self, keys: &[&TestKeypair]) {
        let body = Self::document(keys);
        for keys_path in [Self::v2_keys_path(), Self::legacy_keys_path()] {
            Mock::given(method("GET"))
                .and(path(keys_path))
                .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
                .mount(&self.server)
                .await;
        }
    }

    /// Publish `keys` on the v2 path and require exactly `times` fetches.
    pub async fn serve_v2_keys_expecting(&self, keys: &[&TestKeypair], times: u64) {
        Mock::given(method("GET"))
            .and(path(Self::v2_keys_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(Self::document(keys)))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Publish `keys` on the v2 path for the next `times` fetches only.
    ///
    /// Later mounts answer once these are used up, which lets a test
    /// rotate the published key set.
    pub async fn serve_v2_keys_once_for(&self, keys: &[&TestKeypair], times: u64) {
        Mock::given(method("GET"))
            .and(path(Self::v2_keys_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(Self::document(keys)))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Answer the v2 path with a bare status and require `times` fetches.
    pub async fn serve_v2_status(&self, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(Self::v2_keys_path()))
            .respond_with(ResponseTemplate::new(status))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Publish `keys` on the v2 path after `delay`.
    pub async fn serve_v2_delayed(&self, keys: &[&TestKeypair], delay: Duration) {
        Mock::given(method("GET"))
            .and(path(Self::v2_keys_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(Self::document(keys))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Number of requests the directory has received so far.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_both_discovery_paths() {
        let jwks = MockJwks::start().await;
        let keypair = TestKeypair::primary();
        jwks.serve_keys(&[&keypair]).await;

        for keys_path in [MockJwks::v2_keys_path(), MockJwks::legacy_keys_path()] {
            let body: Value = reqwest::get(format!("{}{}", jwks.authority_host(), keys_path))
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(body["keys"][0]["kid"], keypair.kid());
        }
        assert_eq!(jwks.fetch_count().await, 2);
    }

    #[tokio::test]
    async fn test_issuers_point_at_tenant() {
        let jwks = MockJwks::start().await;

        assert!(jwks.v2_issuer().starts_with(&jwks.authority_host()));
        assert!(jwks.v2_issuer().ends_with("/v2.0"));
        assert_eq!(
            jwks.legacy_issuer(),
            format!("https://sts.windows.net/{TEST_TENANT_ID}/")
        );
    }
}
