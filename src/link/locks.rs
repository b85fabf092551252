// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-identity mutual exclusion.
//!
//! An arena of async mutexes keyed by external id. Link operations for the
//! same identity serialize; operations for distinct identities share no
//! lock. Entries are evicted once uncontended, so the arena stays bounded
//! by the number of in-flight identities.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct IdentityLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the critical section of one link operation.
///
/// Dropping the guard releases the lock and evicts the arena entry if no
/// other task is waiting on it — including when the owning future is
/// cancelled by a deadline.
pub struct IdentityGuard<'a> {
    owner: &'a IdentityLocks,
    external_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl IdentityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `external_id`, waiting if another link
    /// operation for the same identity is in flight.
    pub async fn acquire(&self, external_id: &str) -> IdentityGuard<'_> {
        let slot = {
            let mut locks = self.locks.lock().expect("identity lock table poisoned");
            locks.entry(external_id.to_string()).or_default().clone()
        };
        let guard = slot.lock_owned().await;
        IdentityGuard {
            owner: self,
            external_id: external_id.to_string(),
            guard: Some(guard),
        }
    }

    fn release(&self, external_id: &str) {
        let mut locks = self.locks.lock().expect("identity lock table poisoned");
        if let Some(slot) = locks.get(external_id) {
            // The map holds the last reference only when nobody is waiting
            if Arc::strong_count(slot) == 1 {
                locks.remove(external_id);
            }
        }
    }

    #[cfg(test)]
    fn active(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

impl Drop for IdentityGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex before inspecting the arena entry
        self.guard.take();
        self.owner.release(&self.external_id);
    }
}
