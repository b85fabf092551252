// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Assertion Verification Module
//!
//! This module verifies identity assertions (provider-issued JWTs) presented
//! by the frontend collaborator.
//!
//! ## Verification Flow
//!
//! 1. Frontend authenticates the user with the identity provider
//! 2. Frontend forwards the provider id token to `POST /v1/link`
//! 3. This module:
//!    - Resolves the signing key (static verification key, or JWKS over HTTPS)
//!    - Verifies signature, expiry, issuer, audience
//!    - Extracts `sub` → canonical `external_id` plus linkable claims
//!
//! ## Security
//!
//! - JWKS is fetched via HTTPS only, cached with a TTL
//! - Concurrent cache misses collapse into a single fetch
//! - Clock skew tolerance defaults to zero (configurable)
//! - Raw tokens are never logged; `RawAssertion` redacts its Debug output

pub mod claims;
pub mod error;
pub mod keys;
pub mod verifier;

pub use claims::{IdentityClaims, RawAssertion, VerifiedIdentity};
pub use error::VerifyError;
pub use keys::{JwksCache, KeySource};
pub use verifier::AssertionVerifier;
