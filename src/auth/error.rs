// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Assertion verification errors.

/// Why an assertion failed verification.
///
/// Every variant is terminal for the call that produced it: retrying with
/// the same token cannot succeed, except for `KeyFetch`, which is transient
/// (the caller may retry with backoff).
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Token is structurally invalid (segments, encoding, or claim shape)
    #[error("assertion is malformed")]
    Malformed,

    /// No configured or retrievable key matches the token header
    #[error("no signing key matches the assertion")]
    UnknownSigner,

    /// Signature does not verify against the resolved key
    #[error("assertion signature is invalid")]
    InvalidSignature,

    /// Token expiry has elapsed
    #[error("assertion has expired")]
    Expired,

    /// Token is not yet valid (`nbf` in the future)
    #[error("assertion is not yet valid")]
    NotYetValid,

    /// Issuer claim does not match the configured issuer
    #[error("assertion issuer mismatch")]
    IssuerMismatch,

    /// Audience claim does not match the configured application id
    #[error("assertion audience mismatch")]
    AudienceMismatch,

    /// Subject claim is absent or empty
    #[error("assertion subject is missing")]
    MissingSubject,

    /// Signing key retrieval failed (transient)
    #[error("signing key retrieval failed: {0}")]
    KeyFetch(String),
}

impl VerifyError {
    /// Stable diagnostic code, safe to return to clients.
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::Malformed => "malformed_assertion",
            VerifyError::UnknownSigner => "unknown_signer",
            VerifyError::InvalidSignature => "invalid_signature",
            VerifyError::Expired => "expired",
            VerifyError::NotYetValid => "not_yet_valid",
            VerifyError::IssuerMismatch => "issuer_mismatch",
            VerifyError::AudienceMismatch => "audience_mismatch",
            VerifyError::MissingSubject => "missing_subject",
            VerifyError::KeyFetch(_) => "key_fetch_failed",
        }
    }

    /// Whether a caller-side retry with the same token could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, VerifyError::KeyFetch(_))
    }
}
