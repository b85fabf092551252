// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response data structures used by the REST API. All types
//! derive `Serialize`/`Deserialize` and `ToSchema` for automatic JSON
//! handling and OpenAPI documentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::link::AccountLink;

/// Request body for `POST /v1/link`.
///
/// The assertion may instead be supplied via the `x-id-token` request
/// header, which takes precedence over the body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkRequest {
    /// The provider-issued id token
    pub id_token: String,
}

/// Account view returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct AccountView {
    /// Internal account identifier
    pub account_id: Uuid,
    /// Provider-scoped external identity
    pub external_id: String,
    /// When the account link was first created
    pub created_at: DateTime<Utc>,
    /// When the identity was last verified
    pub last_verified_at: DateTime<Utc>,
    /// Linked wallet address, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// Linked email address, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Linked phone number, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl From<AccountLink> for AccountView {
    fn from(link: AccountLink) -> Self {
        Self {
            account_id: link.account_id,
            external_id: link.external_id,
            created_at: link.created_at,
            last_verified_at: link.last_verified_at,
            wallet_address: link.wallet_address,
            email: link.email,
            phone: link.phone,
        }
    }
}

/// Response for a successful `POST /v1/link`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LinkResponse {
    /// The account the verified identity is bound to
    pub user: AccountView,
    /// True only on the first successful link for this identity
    pub newly_created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkAttributes;

    #[test]
    fn account_view_from_link_keeps_all_fields() {
        let attrs = LinkAttributes {
            wallet_address: Some("0xabc".to_string()),
            email: Some("user@example.com".to_string()),
            phone: None,
        };
        let link = AccountLink::create("ext-1", &attrs, Utc::now());
        let view: AccountView = link.clone().into();

        assert_eq!(view.account_id, link.account_id);
        assert_eq!(view.external_id, "ext-1");
        assert_eq!(view.wallet_address.as_deref(), Some("0xabc"));
        assert_eq!(view.email.as_deref(), Some("user@example.com"));
        assert!(view.phone.is_none());
    }

    #[test]
    fn absent_attributes_are_omitted_from_json() {
        let link = AccountLink::create("ext-1", &LinkAttributes::default(), Utc::now());
        let view: AccountView = link.into();
        let json = serde_json::to_value(&view).unwrap();

        assert!(json.get("wallet_address").is_none());
        assert!(json.get("email").is_none());
        assert!(json.get("external_id").is_some());
    }
}
