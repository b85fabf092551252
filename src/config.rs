// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and the provider configuration loaded from
//! them at startup. The provider configuration is built once, is immutable
//! afterwards, and is handed to the verifier and link service at
//! construction time. If any required value is absent the service starts
//! unconfigured and every `/v1/link` call fails fast with "Not configured".
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding the embedded link database | `data` |
//! | `PROVIDER_ISSUER` | Expected issuer claim | Required |
//! | `PROVIDER_APP_ID` | Application id, the expected audience claim | Required |
//! | `PROVIDER_JWKS_URL` | Provider JWKS endpoint | One key source required |
//! | `PROVIDER_VERIFICATION_KEY` | Static HMAC verification key | One key source required |
//! | `PROVIDER_CLOCK_SKEW_SECS` | Accepted clock skew for expiry checks | `0` |
//! | `LINK_TIMEOUT_SECS` | Overall deadline per link call | `10` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::time::Duration;

use url::Url;

use crate::auth::{AssertionVerifier, JwksCache, KeySource};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const PROVIDER_ISSUER_ENV: &str = "PROVIDER_ISSUER";
pub const PROVIDER_APP_ID_ENV: &str = "PROVIDER_APP_ID";
pub const PROVIDER_JWKS_URL_ENV: &str = "PROVIDER_JWKS_URL";
pub const PROVIDER_VERIFICATION_KEY_ENV: &str = "PROVIDER_VERIFICATION_KEY";
pub const PROVIDER_CLOCK_SKEW_ENV: &str = "PROVIDER_CLOCK_SKEW_SECS";
pub const LINK_TIMEOUT_ENV: &str = "LINK_TIMEOUT_SECS";

/// Where the verifier obtains signing keys, as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySourceConfig {
    /// JWKS endpoint (takes precedence when both sources are set)
    JwksUrl(Url),
    /// Static HMAC verification key shared with the provider
    Secret(String),
}

/// Immutable provider configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Expected issuer claim
    pub issuer: String,
    /// Application id; the expected audience claim
    pub app_id: String,
    /// Signing-key source
    pub keys: KeySourceConfig,
    /// Accepted clock skew for expiry checks (zero unless configured)
    pub clock_skew: Duration,
    /// Overall deadline per link call
    pub call_timeout: Duration,
}

impl ProviderConfig {
    /// Load from the process environment.
    ///
    /// Returns `None` (with a warning naming the missing variable) when any
    /// required value is absent, leaving the service unconfigured.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary lookup function.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let issuer = required(&lookup, PROVIDER_ISSUER_ENV)?;
        let app_id = required(&lookup, PROVIDER_APP_ID_ENV)?;

        let keys = match lookup(PROVIDER_JWKS_URL_ENV).filter(|v| !v.is_empty()) {
            Some(raw) => match Url::parse(&raw) {
                Ok(url) => KeySourceConfig::JwksUrl(url),
                Err(e) => {
                    tracing::warn!(error = %e, "{PROVIDER_JWKS_URL_ENV} is not a valid URL");
                    return None;
                }
            },
            None => match lookup(PROVIDER_VERIFICATION_KEY_ENV).filter(|v| !v.is_empty()) {
                Some(secret) => KeySourceConfig::Secret(secret),
                None => {
                    tracing::warn!(
                        "neither {PROVIDER_JWKS_URL_ENV} nor {PROVIDER_VERIFICATION_KEY_ENV} is set"
                    );
                    return None;
                }
            },
        };

        let clock_skew = duration_from(&lookup, PROVIDER_CLOCK_SKEW_ENV, 0);
        let call_timeout = duration_from(&lookup, LINK_TIMEOUT_ENV, 10);

        Some(Self {
            issuer,
            app_id,
            keys,
            clock_skew,
            call_timeout,
        })
    }

    /// Build the assertion verifier this configuration describes.
    pub fn verifier(&self) -> AssertionVerifier {
        let keys = match &self.keys {
            KeySourceConfig::JwksUrl(url) => KeySource::Jwks(JwksCache::new(url.as_str())),
            KeySourceConfig::Secret(secret) => KeySource::Secret(secret.as_bytes().to_vec()),
        };
        AssertionVerifier::new(&self.issuer, &self.app_id, keys).with_clock_skew(self.clock_skew)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    match lookup(name).filter(|v| !v.is_empty()) {
        Some(value) => Some(value),
        None => {
            tracing::warn!("required configuration {name} is not set");
            None
        }
    }
}

fn duration_from(lookup: &impl Fn(&str) -> Option<String>, name: &str, default_secs: u64) -> Duration {
    let secs = lookup(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(vars: &HashMap<String, String>) -> Option<ProviderConfig> {
        ProviderConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn loads_with_secret_key_source() {
        let vars = env(&[
            (PROVIDER_ISSUER_ENV, "https://auth.provider.test"),
            (PROVIDER_APP_ID_ENV, "app_test"),
            (PROVIDER_VERIFICATION_KEY_ENV, "shhh"),
        ]);

        let config = load(&vars).unwrap();
        assert_eq!(config.issuer, "https://auth.provider.test");
        assert_eq!(config.app_id, "app_test");
        assert_eq!(config.keys, KeySourceConfig::Secret("shhh".to_string()));
        assert_eq!(config.clock_skew, Duration::ZERO);
        assert_eq!(config.call_timeout, Duration::from_secs(10));
    }

    #[test]
    fn jwks_url_takes_precedence_over_secret() {
        let vars = env(&[
            (PROVIDER_ISSUER_ENV, "https://auth.provider.test"),
            (PROVIDER_APP_ID_ENV, "app_test"),
            (PROVIDER_JWKS_URL_ENV, "https://auth.provider.test/jwks.json"),
            (PROVIDER_VERIFICATION_KEY_ENV, "shhh"),
        ]);

        let config = load(&vars).unwrap();
        assert!(matches!(config.keys, KeySourceConfig::JwksUrl(_)));
    }

    #[test]
    fn missing_issuer_leaves_service_unconfigured() {
        let vars = env(&[
            (PROVIDER_APP_ID_ENV, "app_test"),
            (PROVIDER_VERIFICATION_KEY_ENV, "shhh"),
        ]);
        assert!(load(&vars).is_none());
    }

    #[test]
    fn missing_key_source_leaves_service_unconfigured() {
        let vars = env(&[
            (PROVIDER_ISSUER_ENV, "https://auth.provider.test"),
            (PROVIDER_APP_ID_ENV, "app_test"),
        ]);
        assert!(load(&vars).is_none());
    }

    #[test]
    fn empty_values_count_as_missing() {
        let vars = env(&[
            (PROVIDER_ISSUER_ENV, ""),
            (PROVIDER_APP_ID_ENV, "app_test"),
            (PROVIDER_VERIFICATION_KEY_ENV, "shhh"),
        ]);
        assert!(load(&vars).is_none());
    }

    #[test]
    fn invalid_jwks_url_leaves_service_unconfigured() {
        let vars = env(&[
            (PROVIDER_ISSUER_ENV, "https://auth.provider.test"),
            (PROVIDER_APP_ID_ENV, "app_test"),
            (PROVIDER_JWKS_URL_ENV, "not a url"),
        ]);
        assert!(load(&vars).is_none());
    }

    #[test]
    fn skew_and_timeout_are_configurable() {
        let vars = env(&[
            (PROVIDER_ISSUER_ENV, "https://auth.provider.test"),
            (PROVIDER_APP_ID_ENV, "app_test"),
            (PROVIDER_VERIFICATION_KEY_ENV, "shhh"),
            (PROVIDER_CLOCK_SKEW_ENV, "60"),
            (LINK_TIMEOUT_ENV, "5"),
        ]);

        let config = load(&vars).unwrap();
        assert_eq!(config.clock_skew, Duration::from_secs(60));
        assert_eq!(config.call_timeout, Duration::from_secs(5));
    }
}
