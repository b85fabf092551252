// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Assertion verification against the configured provider.

use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Validation};

use super::claims::{AssertionClaims, RawAssertion, VerifiedIdentity};
use super::error::VerifyError;
use super::keys::KeySource;

/// Verifies provider-issued identity assertions.
///
/// Verification is a pure function of (assertion, current time, cached key
/// material): the only I/O is signing-key retrieval on a JWKS cache miss.
pub struct AssertionVerifier {
    /// Expected issuer claim
    issuer: String,
    /// Expected audience claim (the provider application id)
    audience: String,
    /// Accepted clock skew when checking expiry. Zero unless configured.
    clock_skew: Duration,
    /// Where signing keys come from
    keys: KeySource,
}

impl AssertionVerifier {
    /// Create a verifier for the configured provider.
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, keys: KeySource) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            clock_skew: Duration::ZERO,
            keys,
        }
    }

    /// Accept the given clock skew when checking expiry.
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// The signing-key source (used by health checks).
    pub fn key_source(&self) -> &KeySource {
        &self.keys
    }

    /// Verify an assertion and produce the trusted identity it attests.
    ///
    /// Checks run in order: structural parse, key resolution, signature,
    /// expiry, issuer/audience, subject extraction. The first failure wins.
    pub async fn verify(&self, raw: &RawAssertion) -> Result<VerifiedIdentity, VerifyError> {
        if raw.is_empty() {
            return Err(VerifyError::Malformed);
        }

        let header = decode_header(raw.as_str()).map_err(|_| VerifyError::Malformed)?;

        let (decoding_key, algorithm) = self.keys.resolve(&header).await?;

        let mut validation = Validation::new(algorithm);
        validation.leeway = self.clock_skew.as_secs();
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let token_data = decode::<AssertionClaims>(raw.as_str(), &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => VerifyError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => VerifyError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => VerifyError::IssuerMismatch,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => VerifyError::AudienceMismatch,
                jsonwebtoken::errors::ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(c) if c.as_str() == "aud" => {
                    VerifyError::AudienceMismatch
                }
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(c) if c.as_str() == "iss" => {
                    VerifyError::IssuerMismatch
                }
                _ => VerifyError::Malformed,
            })?;

        VerifiedIdentity::from_claims(token_data.claims)
    }
}
