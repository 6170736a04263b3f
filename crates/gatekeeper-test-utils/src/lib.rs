//! # Gatekeeper Test Utilities
//!
//! Shared test utilities for the gatekeeper service.
//!
//! This crate provides:
//! - Fixed RSA key pairs that sign RS256 tokens (`crypto_fixtures`)
//! - A claims builder for directory-style tokens (`token_builders`)
//! - A mock tenant key directory on wiremock (`jwks_harness`)
//! - Server test harness (`TestGatekeeperServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gatekeeper_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let jwks = MockJwks::start().await;
//!     let keypair = TestKeypair::primary();
//!     jwks.serve_keys(&[&keypair]).await;
//!
//!     let server = TestGatekeeperServer::spawn(&jwks).await?;
//!     let token = TestTokenBuilder::new()
//!         .issued_by(&jwks.v2_issuer())
//!         .sign(&keypair);
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/me", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_harness;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_harness::*;
pub use server_harness::*;
pub use token_builders::*;
