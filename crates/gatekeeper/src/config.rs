//! Gatekeeper configuration.
//!
//! Configuration is loaded from environment variables once at startup. The
//! client id is redacted in Debug output.

use crate::auth::jwks::{DEFAULT_CACHE_TTL, DEFAULT_FETCH_TIMEOUT, MAX_CACHE_TTL};
use crate::auth::tenant::{DEFAULT_AUTHORITY_HOST, DEFAULT_STS_HOST};
use crate::auth::{AuthorizationPolicy, GroupTable, TenantConfig};
use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Upper bound on a single JWKS fetch.
pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// Gatekeeper configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Directory tenant id.
    pub tenant_id: String,

    /// Application (client) id tokens must be issued for.
    pub client_id: String,

    /// Host for v2.0 issuers and all JWKS discovery documents.
    pub authority_host: String,

    /// Host of the legacy token service issuer.
    pub sts_host: String,

    /// Clock skew tolerance for `exp`/`nbf`.
    pub jwt_clock_skew: Duration,

    /// Freshness window of the cached key set.
    pub jwks_cache_ttl: Duration,

    /// Timeout for one JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    /// Policy for `/api/v1/*`.
    pub api_policy: AuthorizationPolicy,

    /// Ordered group-to-department table.
    pub group_table: GroupTable,

    /// Graceful shutdown drain period in seconds.
    pub drain_seconds: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &"[REDACTED]")
            .field("authority_host", &self.authority_host)
            .field("sts_host", &self.sts_host)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("api_policy", &self.api_policy)
            .field("group_table_rows", &self.group_table.len())
            .field("drain_seconds", &self.drain_seconds)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid group table configuration: {0}")]
    InvalidGroupTable(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let tenant_id = required(vars, "AZURE_TENANT_ID")?;
        let client_id = required(vars, "AZURE_CLIENT_ID")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let authority_host = host(vars, "AUTHORITY_HOST", DEFAULT_AUTHORITY_HOST);
        let sts_host = host(vars, "STS_HOST", DEFAULT_STS_HOST);

        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            let value = value.unsigned_abs();
            if value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let jwks_cache_ttl = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            if value > MAX_CACHE_TTL.as_secs() {
                return Err(ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be at most {} seconds, got {}",
                    MAX_CACHE_TTL.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CACHE_TTL
        };

        let jwks_fetch_timeout = if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidFetchTimeout(format!(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_FETCH_TIMEOUT.as_secs() {
                return Err(ConfigError::InvalidFetchTimeout(format!(
                    "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_FETCH_TIMEOUT.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_FETCH_TIMEOUT
        };

        let api_policy = AuthorizationPolicy::from_lists(
            vars.get("API_SCOPES_ANY").map_or("", String::as_str),
            vars.get("API_ROLES_ANY").map_or("", String::as_str),
            vars.get("API_GROUPS_ANY").map_or("", String::as_str),
        );

        let group_table = match vars.get("GROUP_TABLE") {
            Some(json) if !json.trim().is_empty() => GroupTable::from_json(json).map_err(|e| {
                ConfigError::InvalidGroupTable(format!(
                    "GROUP_TABLE must be a JSON array of {{location, role, group_id}} or an object of {{location: {{role: group_id}}}}: {}",
                    e
                ))
            })?,
            _ => GroupTable::default(),
        };

        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => DEFAULT_DRAIN_SECONDS,
        };

        Ok(Config {
            bind_address,
            tenant_id,
            client_id,
            authority_host,
            sts_host,
            jwt_clock_skew,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            api_policy,
            group_table,
            drain_seconds,
        })
    }

    /// Tenant identity rules derived from this configuration.
    pub fn tenant(&self) -> TenantConfig {
        TenantConfig::with_hosts(
            self.tenant_id.clone(),
            self.client_id.clone(),
            self.authority_host.clone(),
            self.sts_host.clone(),
        )
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn host(vars: &HashMap<String, String>, name: &str, default: &str) -> String {
    vars.get(name)
        .map_or(default, String::as_str)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            ("AZURE_TENANT_ID".to_string(), "tenant-1".to_string()),
            (
                "AZURE_CLIENT_ID".to_string(),
                "9f2b6c1e-client-secretish".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.tenant_id, "tenant-1");
        assert_eq!(config.authority_host, "https://login.microsoftonline.com");
        assert_eq!(config.sts_host, "https://sts.windows.net");
        assert_eq!(config.jwt_clock_skew, DEFAULT_CLOCK_SKEW);
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.jwks_fetch_timeout, Duration::from_secs(5));
        assert!(config.api_policy.is_empty());
        assert!(config.group_table.is_empty());
        assert_eq!(config.drain_seconds, DEFAULT_DRAIN_SECONDS);
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("AUTHORITY_HOST".to_string(), "http://127.0.0.1:7000/".to_string());
        vars.insert("STS_HOST".to_string(), "http://sts.local".to_string());
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "120".to_string());
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "60".to_string());
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "2".to_string());
        vars.insert("API_SCOPES_ANY".to_string(), "access_as_user".to_string());
        vars.insert("API_ROLES_ANY".to_string(), "Reader, Admin".to_string());
        vars.insert(
            "GROUP_TABLE".to_string(),
            r#"[{"location":"Berlin","role":"Staff","group_id":"g-1"}]"#.to_string(),
        );
        vars.insert("DRAIN_SECONDS".to_string(), "0".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.authority_host, "http://127.0.0.1:7000");
        assert_eq!(config.sts_host, "http://sts.local");
        assert_eq!(config.jwt_clock_skew, Duration::from_secs(120));
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(60));
        assert_eq!(config.jwks_fetch_timeout, Duration::from_secs(2));
        assert!(config.api_policy.scopes_any().contains("access_as_user"));
        assert_eq!(config.api_policy.roles_any().len(), 2);
        assert_eq!(config.group_table.len(), 1);
        assert_eq!(config.drain_seconds, 0);
    }

    #[test]
    fn test_tenant_derivation() {
        let mut vars = base_vars();
        vars.insert("AUTHORITY_HOST".to_string(), "http://127.0.0.1:7000".to_string());
        let tenant = Config::from_vars(&vars).unwrap().tenant();

        assert_eq!(tenant.v2_issuer(), "http://127.0.0.1:7000/tenant-1/v2.0");
        assert_eq!(tenant.legacy_issuer(), "https://sts.windows.net/tenant-1/");
        assert!(tenant.is_allowed_audience("api://9f2b6c1e-client-secretish"));
    }

    #[test]
    fn test_from_vars_missing_tenant() {
        let mut vars = base_vars();
        vars.remove("AZURE_TENANT_ID");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AZURE_TENANT_ID"));
    }

    #[test]
    fn test_from_vars_blank_client_id_is_missing() {
        let mut vars = base_vars();
        vars.insert("AZURE_CLIENT_ID".to_string(), "   ".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "AZURE_CLIENT_ID"));
    }

    #[test]
    fn test_jwt_clock_skew_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be positive"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_rejects_too_large() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must not exceed 600"))
        );
    }

    #[test]
    fn test_jwt_clock_skew_accepts_max() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jwt_clock_skew, MAX_CLOCK_SKEW);
    }

    #[test]
    fn test_jwt_clock_skew_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert(
            "JWT_CLOCK_SKEW_SECONDS".to_string(),
            "five-minutes".to_string(),
        );

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidJwtClockSkew(msg)) if msg.contains("must be a valid integer"))
        );
    }

    #[test]
    fn test_cache_ttl_rejects_zero() {
        let mut vars = base_vars();
        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCacheTtl(msg)) if msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_cache_ttl_upper_bound() {
        let mut vars = base_vars();
        vars.insert(
            "JWKS_CACHE_TTL_SECONDS".to_string(),
            u64::MAX.to_string(),
        );
        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidCacheTtl(msg)) if msg.contains("must be at most"))
        );

        vars.insert("JWKS_CACHE_TTL_SECONDS".to_string(), "86400".to_string());
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwks_cache_ttl, MAX_CACHE_TTL);
    }

    #[test]
    fn test_fetch_timeout_bounds() {
        for bad in ["0", "31", "-1", "soon"] {
            let mut vars = base_vars();
            vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), bad.to_string());
            assert!(
                matches!(Config::from_vars(&vars), Err(ConfigError::InvalidFetchTimeout(_))),
                "{bad} should be rejected"
            );
        }

        let mut vars = base_vars();
        vars.insert("JWKS_FETCH_TIMEOUT_SECONDS".to_string(), "30".to_string());
        assert_eq!(
            Config::from_vars(&vars).unwrap().jwks_fetch_timeout,
            MAX_FETCH_TIMEOUT
        );
    }

    #[test]
    fn test_group_table_rejects_bad_json() {
        let mut vars = base_vars();
        vars.insert("GROUP_TABLE".to_string(), r#"{"Berlin":"g-1"}"#.to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidGroupTable(_))));
    }

    #[test]
    fn test_group_table_accepts_nested_form() {
        let mut vars = base_vars();
        vars.insert(
            "GROUP_TABLE".to_string(),
            r#"{"Berlin":{"Manager":"g-1","Staff":"g-2"}}"#.to_string(),
        );

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.group_table.len(), 2);
    }

    #[test]
    fn test_drain_seconds_rejects_non_numeric() {
        let mut vars = base_vars();
        vars.insert("DRAIN_SECONDS".to_string(), "thirty".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidDrainSeconds(_))));
    }

    #[test]
    fn test_debug_redacts_client_id() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("9f2b6c1e"));
    }
}
