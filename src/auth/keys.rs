// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signing-key resolution for assertion verification.
//!
//! Two key sources are supported:
//!
//! - A static verification key (the provider application secret, HMAC)
//! - A JWKS endpoint (RSA/EC keys resolved by `kid`)
//!
//! ## Security
//!
//! - JWKS is fetched via HTTPS only
//! - Keys are cached process-wide with a configurable TTL
//! - Concurrent cache misses collapse into one fetch (single-flight)
//! - A failed fetch is retried once before surfacing a transient error

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use tokio::sync::{Mutex, RwLock};

use super::error::VerifyError;

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Where the verifier obtains signing keys.
pub enum KeySource {
    /// Static HMAC verification key shared with the provider.
    Secret(Vec<u8>),
    /// JWKS endpoint with TTL caching.
    Jwks(JwksCache),
}

impl KeySource {
    /// Resolve the decoding key for a token header.
    ///
    /// Fails with `UnknownSigner` when no configured or retrievable key can
    /// verify a token with this header.
    pub async fn resolve(&self, header: &Header) -> Result<(DecodingKey, Algorithm), VerifyError> {
        match self {
            KeySource::Secret(secret) => match header.alg {
                Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                    Ok((DecodingKey::from_secret(secret), header.alg))
                }
                _ => Err(VerifyError::UnknownSigner),
            },
            KeySource::Jwks(cache) => match &header.kid {
                Some(kid) => cache.decoding_key(kid).await,
                // No kid in the header, try any key in the set
                None => cache.any_decoding_key().await,
            },
        }
    }

    /// Whether key material is ready without network I/O.
    pub async fn is_ready(&self) -> bool {
        match self {
            KeySource::Secret(_) => true,
            KeySource::Jwks(cache) => cache.is_cached().await,
        }
    }
}

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// JWKS fetching and caching.
pub struct JwksCache {
    /// JWKS URL (provider endpoint)
    jwks_url: String,
    /// Cache TTL
    cache_ttl: Duration,
    /// Cached JWKS
    cache: RwLock<Option<CacheEntry>>,
    /// Collapses concurrent cache misses into one fetch
    fetch_lock: Mutex<()>,
    /// HTTP client
    client: reqwest::Client,
}

impl JwksCache {
    /// Create a new JWKS cache.
    ///
    /// # Arguments
    /// - `jwks_url`: The JWKS endpoint URL (e.g., `https://auth.example.com/.well-known/jwks.json`)
    pub fn new(jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: RwLock::new(None),
            fetch_lock: Mutex::new(()),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Create with custom cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Fetch JWKS (cached, single-flight on miss).
    async fn get_jwks(&self) -> Result<JwkSet, VerifyError> {
        if let Some(jwks) = self.cached().await {
            return Ok(jwks);
        }

        // Single-flight: the first miss fetches, concurrent misses queue
        // here and find the cache warm on re-check.
        let _flight = self.fetch_lock.lock().await;
        if let Some(jwks) = self.cached().await {
            return Ok(jwks);
        }

        // One internal retry before surfacing the miss as transient
        let jwks = match self.fetch_jwks().await {
            Ok(jwks) => jwks,
            Err(first) => {
                tracing::debug!(error = %first, "JWKS fetch failed, retrying once");
                self.fetch_jwks().await?
            }
        };

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });

        Ok(jwks)
    }

    /// Return the cached set if still within TTL.
    async fn cached(&self) -> Option<JwkSet> {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) if entry.fetched_at.elapsed() < self.cache_ttl => Some(entry.jwks.clone()),
            _ => None,
        }
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<JwkSet, VerifyError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VerifyError::KeyFetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VerifyError::KeyFetch(e.to_string()))
    }

    /// Get a decoding key for the given key ID.
    pub async fn decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), VerifyError> {
        let jwks = self.get_jwks().await?;

        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or(VerifyError::UnknownSigner)?;

        jwk_to_decoding_key(jwk)
    }

    /// Get any usable decoding key (for tokens without kid).
    pub async fn any_decoding_key(&self) -> Result<(DecodingKey, Algorithm), VerifyError> {
        let jwks = self.get_jwks().await?;

        for jwk in &jwks.keys {
            if let Ok(result) = jwk_to_decoding_key(jwk) {
                return Ok(result);
            }
        }

        Err(VerifyError::UnknownSigner)
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<(), VerifyError> {
        let jwks = self.fetch_jwks().await?;
        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        let cache = self.cache.read().await;
        match &*cache {
            Some(entry) => entry.fetched_at.elapsed() < self.cache_ttl,
            None => false,
        }
    }
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), VerifyError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|_| VerifyError::UnknownSigner)?;

            let alg = jwk
                .common
                .key_algorithm
                .map(|a| match a {
                    jsonwebtoken::jwk::KeyAlgorithm::RS256 => Algorithm::RS256,
                    jsonwebtoken::jwk::KeyAlgorithm::RS384 => Algorithm::RS384,
                    jsonwebtoken::jwk::KeyAlgorithm::RS512 => Algorithm::RS512,
                    _ => Algorithm::RS256, // Default for RSA
                })
                .unwrap_or(Algorithm::RS256);

            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|_| VerifyError::UnknownSigner)?;

            let alg = jwk
                .common
                .key_algorithm
                .map(|a| match a {
                    jsonwebtoken::jwk::KeyAlgorithm::ES256 => Algorithm::ES256,
                    jsonwebtoken::jwk::KeyAlgorithm::ES384 => Algorithm::ES384,
                    _ => Algorithm::ES256, // Default for EC
                })
                .unwrap_or(Algorithm::ES256);

            Ok((key, alg))
        }
        _ => Err(VerifyError::UnknownSigner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwks_cache_creation() {
        let cache = JwksCache::new("https://auth.example.com/.well-known/jwks.json");
        assert_eq!(
            cache.jwks_url(),
            "https://auth.example.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn custom_cache_ttl() {
        let cache = JwksCache::new("https://example.com/.well-known/jwks.json")
            .with_cache_ttl(Duration::from_secs(60));
        assert_eq!(cache.cache_ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn cache_initially_empty() {
        let cache = JwksCache::new("https://example.com/.well-known/jwks.json");
        assert!(!cache.is_cached().await);
    }

    #[tokio::test]
    async fn secret_source_is_always_ready() {
        let source = KeySource::Secret(b"app-secret".to_vec());
        assert!(source.is_ready().await);
    }

    #[tokio::test]
    async fn secret_source_rejects_asymmetric_headers() {
        let source = KeySource::Secret(b"app-secret".to_vec());
        let header = Header::new(Algorithm::RS256);
        let err = source.resolve(&header).await.unwrap_err();
        assert!(matches!(err, VerifyError::UnknownSigner));
    }

    #[tokio::test]
    async fn secret_source_resolves_hmac_headers() {
        let source = KeySource::Secret(b"app-secret".to_vec());
        let header = Header::new(Algorithm::HS256);
        let (_key, alg) = source.resolve(&header).await.unwrap();
        assert_eq!(alg, Algorithm::HS256);
    }
}
