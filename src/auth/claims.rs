// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Raw assertions, token claims, and the verified identity they produce.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::VerifyError;

/// An identity assertion exactly as received from the client.
///
/// Treated as secret material until verified: the payload is never logged,
/// never persisted, and dropped as soon as verification completes.
#[derive(Clone)]
pub struct RawAssertion(String);

impl RawAssertion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RawAssertion {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RawAssertion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// Redact the payload so the token can never leak through debug logging.
impl std::fmt::Debug for RawAssertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RawAssertion(<redacted>)")
    }
}

/// Claims decoded from a provider id token.
///
/// The provider issues standard OIDC claims plus optional linkable
/// attributes (email, phone, wallet address). Unknown claims are retained
/// in `extra`.
#[derive(Debug, Clone, Deserialize)]
pub struct AssertionClaims {
    /// Subject - the canonical provider-scoped user identifier
    #[serde(default)]
    pub sub: String,

    /// Issued at timestamp
    #[serde(default)]
    pub iat: i64,

    /// Expiration timestamp
    #[serde(default)]
    pub exp: i64,

    /// Issuer
    #[serde(default)]
    pub iss: String,

    /// Audience (validated by the jsonwebtoken crate, not read directly)
    #[serde(default)]
    #[allow(dead_code)]
    pub aud: Option<serde_json::Value>,

    /// Verified email address, if the provider linked one
    #[serde(default)]
    pub email: Option<String>,

    /// Verified phone number, if the provider linked one
    #[serde(default)]
    pub phone: Option<String>,

    /// Wallet address the provider linked to this identity
    #[serde(default)]
    pub wallet_address: Option<String>,

    /// Any remaining provider-defined claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Provider-defined claims carried by a verified identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityClaims {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub wallet_address: Option<String>,
    pub extra: HashMap<String, serde_json::Value>,
}

/// The trusted result of successful assertion verification.
///
/// Immutable once constructed; owned by the link service for the duration
/// of one call.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Provider-scoped subject identifier
    pub external_id: String,
    /// Issuer that signed the assertion
    pub issuer: String,
    /// When the assertion was issued
    pub issued_at: DateTime<Utc>,
    /// When the assertion expires
    pub expires_at: DateTime<Utc>,
    /// Linkable claims carried by the assertion
    pub claims: IdentityClaims,
}

impl VerifiedIdentity {
    /// Build a verified identity from decoded claims.
    ///
    /// The signature, expiry, issuer, and audience have already been checked
    /// by the verifier; this enforces the remaining structural invariants:
    /// a non-empty subject and `exp > iat`.
    pub fn from_claims(claims: AssertionClaims) -> Result<Self, VerifyError> {
        if claims.sub.trim().is_empty() {
            return Err(VerifyError::MissingSubject);
        }
        if claims.exp <= claims.iat {
            return Err(VerifyError::Malformed);
        }

        let issued_at = timestamp(claims.iat)?;
        let expires_at = timestamp(claims.exp)?;

        Ok(Self {
            external_id: claims.sub,
            issuer: claims.iss,
            issued_at,
            expires_at,
            claims: IdentityClaims {
                email: claims.email,
                phone: claims.phone,
                wallet_address: claims.wallet_address,
                extra: claims.extra,
            },
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, VerifyError> {
    DateTime::from_timestamp(secs, 0).ok_or(VerifyError::Malformed)
}
