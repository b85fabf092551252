// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process link store.
//!
//! Same contract as the durable engine; the map key provides the
//! `external_id` uniqueness constraint. Used by tests and local tooling.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use super::store::{AccountLink, LinkAttributes, LinkStore, StoreError};

#[derive(Default)]
pub struct MemoryLinkStore {
    links: RwLock<HashMap<String, AccountLink>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored links.
    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.links.read().await.is_empty()
    }
}

impl LinkStore for MemoryLinkStore {
    async fn upsert(
        &self,
        external_id: &str,
        attrs: &LinkAttributes,
    ) -> Result<(AccountLink, bool), StoreError> {
        let mut links = self.links.write().await;
        match links.get_mut(external_id) {
            Some(existing) => {
                existing.apply(attrs, Utc::now());
                Ok((existing.clone(), false))
            }
            None => {
                let link = AccountLink::create(external_id, attrs, Utc::now());
                links.insert(external_id.to_string(), link.clone());
                Ok((link, true))
            }
        }
    }

    async fn lookup(&self, external_id: &str) -> Result<Option<AccountLink>, StoreError> {
        Ok(self.links.read().await.get(external_id).cloned())
    }
}
