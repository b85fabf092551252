// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The link store contract and the `AccountLink` record it owns.
//!
//! Engines must enforce uniqueness of `external_id` at the storage layer,
//! and upserts must be atomic from the caller's perspective: a failed
//! upsert mutates nothing.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::IdentityClaims;

/// Durable binding between an internal account and an external identity.
///
/// Exactly one `AccountLink` exists per `external_id`; `account_id` is
/// generated on first link and stable across repeated links.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AccountLink {
    /// Internal account identifier, generated on first link
    pub account_id: Uuid,
    /// Provider-scoped external identity (unique)
    pub external_id: String,
    /// When the link was first created
    pub created_at: DateTime<Utc>,
    /// When the identity was last verified; monotonically non-decreasing
    pub last_verified_at: DateTime<Utc>,
    /// Wallet address linked through the provider, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// Verified email address, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Verified phone number, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl AccountLink {
    /// Create a fresh link for a first-seen external identity.
    pub fn create(external_id: &str, attrs: &LinkAttributes, now: DateTime<Utc>) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            external_id: external_id.to_string(),
            created_at: now,
            last_verified_at: now,
            wallet_address: attrs.wallet_address.clone(),
            email: attrs.email.clone(),
            phone: attrs.phone.clone(),
        }
    }

    /// Merge attributes from a re-verified identity into an existing link.
    ///
    /// Present attribute values overwrite; absent ones leave the stored
    /// value untouched. `last_verified_at` never moves backwards.
    pub fn apply(&mut self, attrs: &LinkAttributes, now: DateTime<Utc>) {
        if attrs.wallet_address.is_some() {
            self.wallet_address = attrs.wallet_address.clone();
        }
        if attrs.email.is_some() {
            self.email = attrs.email.clone();
        }
        if attrs.phone.is_some() {
            self.phone = attrs.phone.clone();
        }
        self.last_verified_at = self.last_verified_at.max(now);
    }
}

/// Linkable attributes extracted from verified claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAttributes {
    pub wallet_address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl LinkAttributes {
    pub fn from_claims(claims: &IdentityClaims) -> Self {
        Self {
            wallet_address: claims.wallet_address.clone(),
            email: claims.email.clone(),
            phone: claims.phone.clone(),
        }
    }
}

/// Storage-engine failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The engine could not serve the operation (transient)
    #[error("link store unavailable: {0}")]
    Unavailable(String),
    /// The engine returned data violating the link invariants (fatal)
    #[error("link store integrity failure: {0}")]
    Corrupted(String),
}

/// Durable mapping from external identity to internal account.
///
/// The backing engine is swappable; the linking semantics are not. Both
/// operations may suspend on storage I/O.
pub trait LinkStore: Send + Sync {
    /// Create or update the link for `external_id`.
    ///
    /// Returns the resulting link and whether it was newly created.
    fn upsert(
        &self,
        external_id: &str,
        attrs: &LinkAttributes,
    ) -> impl Future<Output = Result<(AccountLink, bool), StoreError>> + Send;

    /// Fetch the link for `external_id`, if one exists.
    fn lookup(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<AccountLink>, StoreError>> + Send;
}
