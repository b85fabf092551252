// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable link store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `account_links`: external_id → serialized AccountLink (JSON bytes)
//!
//! The table key is the `external_id`, so uniqueness is enforced by the
//! storage layer itself. Each upsert runs inside a single write
//! transaction: redb serializes writers and a failed commit mutates
//! nothing, which is what makes the upsert atomic for callers.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::store::{AccountLink, LinkAttributes, LinkStore, StoreError};

/// Primary table: external_id → serialized AccountLink (JSON bytes).
const ACCOUNT_LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("account_links");

impl From<redb::DatabaseError> for StoreError {
    fn from(e: redb::DatabaseError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(e: redb::TableError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(e: redb::StorageError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(e: redb::CommitError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

// A stored row that fails to deserialize is an integrity problem, not an
// availability problem.
impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}

/// Embedded ACID link database.
pub struct LinkDatabase {
    db: Database,
}

impl LinkDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNT_LINKS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl LinkStore for LinkDatabase {
    async fn upsert(
        &self,
        external_id: &str,
        attrs: &LinkAttributes,
    ) -> Result<(AccountLink, bool), StoreError> {
        let write_txn = self.db.begin_write()?;
        let (link, created) = {
            let mut table = write_txn.open_table(ACCOUNT_LINKS)?;

            let existing = match table.get(external_id)? {
                Some(value) => Some(serde_json::from_slice::<AccountLink>(value.value())?),
                None => None,
            };

            let (link, created) = match existing {
                Some(mut link) => {
                    link.apply(attrs, Utc::now());
                    (link, false)
                }
                None => (AccountLink::create(external_id, attrs, Utc::now()), true),
            };

            let json = serde_json::to_vec(&link)?;
            table.insert(external_id, json.as_slice())?;
            (link, created)
        };
        write_txn.commit()?;

        Ok((link, created))
    }

    async fn lookup(&self, external_id: &str) -> Result<Option<AccountLink>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNT_LINKS)?;
        match table.get(external_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}
