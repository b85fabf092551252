// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The request-level link operation.
//!
//! `LinkService` accepts a raw assertion, drives verification, serializes
//! concurrent links per external identity, applies the store upsert, and
//! returns the resulting account view. Verification failures propagate
//! unchanged; they are never retried here.

use std::time::Duration;

use crate::auth::{AssertionVerifier, RawAssertion, VerifyError};

use super::locks::IdentityLocks;
use super::store::{AccountLink, LinkAttributes, LinkStore, StoreError};

/// Overall deadline for one link call unless configured otherwise.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a successful link operation.
#[derive(Debug, Clone)]
pub struct LinkResult {
    /// The account the identity is now bound to
    pub account: AccountLink,
    /// True only on the first successful link for this identity
    pub newly_created: bool,
}

/// Why a link operation failed.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The assertion did not verify; carries the precise failure kind
    #[error(transparent)]
    Verification(#[from] VerifyError),

    /// The link store could not serve the upsert (transient, safe to retry)
    #[error("link store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store returned data violating the one-account-per-identity
    /// invariant; surfaced opaquely
    #[error("account link integrity failure")]
    IdentityConflict,

    /// The call's deadline elapsed during key retrieval or storage I/O
    #[error("link operation timed out")]
    Timeout,
}

impl LinkError {
    /// Stable diagnostic code, safe to return to clients.
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::Verification(e) => e.code(),
            LinkError::StoreUnavailable(_) => "store_unavailable",
            LinkError::IdentityConflict => "internal_error",
            LinkError::Timeout => "timeout",
        }
    }
}

/// Verifies assertions and binds the identities they attest to accounts.
pub struct LinkService<S: LinkStore> {
    verifier: AssertionVerifier,
    store: S,
    locks: IdentityLocks,
    call_timeout: Duration,
}

impl<S: LinkStore> LinkService<S> {
    pub fn new(verifier: AssertionVerifier, store: S) -> Self {
        Self {
            verifier,
            store,
            locks: IdentityLocks::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the overall per-call deadline.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The verifier this service trusts (used by health checks).
    pub fn verifier(&self) -> &AssertionVerifier {
        &self.verifier
    }

    /// Verify `raw` and upsert the link for the identity it attests.
    ///
    /// Safe to retry: repeated calls with valid assertions for the same
    /// identity converge to a single `AccountLink`. Cancellation by the
    /// deadline releases the per-identity lock via guard drop.
    pub async fn link(&self, raw: &RawAssertion) -> Result<LinkResult, LinkError> {
        match tokio::time::timeout(self.call_timeout, self.link_inner(raw)).await {
            Ok(result) => result,
            Err(_) => Err(LinkError::Timeout),
        }
    }

    /// Fetch the current link for an external identity, if any.
    pub async fn account(&self, external_id: &str) -> Result<Option<AccountLink>, LinkError> {
        self.store
            .lookup(external_id)
            .await
            .map_err(|e| store_error(external_id, e))
    }

    async fn link_inner(&self, raw: &RawAssertion) -> Result<LinkResult, LinkError> {
        let identity = self.verifier.verify(raw).await?;

        // Serialize with any concurrent link for the same identity so two
        // near-simultaneous calls cannot both observe "not yet created".
        let _guard = self.locks.acquire(&identity.external_id).await;

        let attrs = LinkAttributes::from_claims(&identity.claims);
        let (account, newly_created) = self
            .store
            .upsert(&identity.external_id, &attrs)
            .await
            .map_err(|e| store_error(&identity.external_id, e))?;

        tracing::info!(
            external_id = %account.external_id,
            account_id = %account.account_id,
            newly_created,
            "identity linked"
        );

        Ok(LinkResult {
            account,
            newly_created,
        })
    }
}

fn store_error(external_id: &str, e: StoreError) -> LinkError {
    match e {
        StoreError::Unavailable(msg) => LinkError::StoreUnavailable(msg),
        StoreError::Corrupted(msg) => {
            tracing::error!(external_id, error = %msg, "account link integrity failure");
            LinkError::IdentityConflict
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::KeySource;
    use crate::link::memory::MemoryLinkStore;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde::Serialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SECRET: &[u8] = b"test-verification-secret";
    const ISSUER: &str = "https://auth.provider.test";
    const AUDIENCE: &str = "app_test";

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        iat: i64,
        exp: i64,
        iss: String,
        aud: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        wallet_address: Option<String>,
    }

    fn mint(sub: &str, wallet: Option<&str>) -> RawAssertion {
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: sub.to_string(),
            iat: now - 60,
            exp: now + 3600,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            wallet_address: wallet.map(str::to_string),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        RawAssertion::new(token)
    }

    fn mint_expired(sub: &str) -> RawAssertion {
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: sub.to_string(),
            iat: now - 7200,
            exp: now - 3600,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            wallet_address: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        RawAssertion::new(token)
    }

    fn verifier() -> AssertionVerifier {
        AssertionVerifier::new(ISSUER, AUDIENCE, KeySource::Secret(SECRET.to_vec()))
    }

    fn service<S: LinkStore>(store: S) -> LinkService<S> {
        LinkService::new(verifier(), store)
    }

    /// Store that fails the first N upserts, then delegates.
    struct FailingStore {
        inner: MemoryLinkStore,
        failures_left: AtomicUsize,
    }

    impl FailingStore {
        fn failing(n: usize) -> Self {
            Self {
                inner: MemoryLinkStore::new(),
                failures_left: AtomicUsize::new(n),
            }
        }
    }

    impl LinkStore for FailingStore {
        async fn upsert(
            &self,
            external_id: &str,
            attrs: &LinkAttributes,
        ) -> Result<(AccountLink, bool), StoreError> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.upsert(external_id, attrs).await
        }

        async fn lookup(&self, external_id: &str) -> Result<Option<AccountLink>, StoreError> {
            self.inner.lookup(external_id).await
        }
    }

    /// Store whose first upsert stalls past any test deadline.
    struct SlowOnceStore {
        inner: MemoryLinkStore,
        slow_calls_left: AtomicUsize,
    }

    impl SlowOnceStore {
        fn new() -> Self {
            Self {
                inner: MemoryLinkStore::new(),
                slow_calls_left: AtomicUsize::new(1),
            }
        }
    }

    impl LinkStore for SlowOnceStore {
        async fn upsert(
            &self,
            external_id: &str,
            attrs: &LinkAttributes,
        ) -> Result<(AccountLink, bool), StoreError> {
            if self
                .slow_calls_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.inner.upsert(external_id, attrs).await
        }

        async fn lookup(&self, external_id: &str) -> Result<Option<AccountLink>, StoreError> {
            self.inner.lookup(external_id).await
        }
    }

    #[tokio::test]
    async fn repeated_links_converge_to_one_account() {
        let svc = service(MemoryLinkStore::new());
        let token = mint("ext-1", Some("0xabc"));

        let first = svc.link(&token).await.unwrap();
        assert!(first.newly_created);
        assert_eq!(first.account.external_id, "ext-1");
        assert_eq!(first.account.wallet_address.as_deref(), Some("0xabc"));

        for _ in 0..3 {
            let again = svc.link(&token).await.unwrap();
            assert!(!again.newly_created);
            assert_eq!(again.account.account_id, first.account.account_id);
        }
    }

    #[tokio::test]
    async fn concurrent_links_for_one_identity_create_one_account() {
        let svc = Arc::new(service(MemoryLinkStore::new()));
        let token = mint("ext-race", None);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = Arc::clone(&svc);
            let token = token.clone();
            handles.push(tokio::spawn(async move { svc.link(&token).await }));
        }

        let mut created = 0;
        let mut account_ids = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            if result.newly_created {
                created += 1;
            }
            account_ids.push(result.account.account_id);
        }

        assert_eq!(created, 1, "exactly one call must create the account");
        assert!(account_ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn distinct_identities_link_independently() {
        let svc = Arc::new(service(MemoryLinkStore::new()));

        let a = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.link(&mint("ext-a", None)).await })
        };
        let b = {
            let svc = Arc::clone(&svc);
            tokio::spawn(async move { svc.link(&mint("ext-b", None)).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert!(a.newly_created);
        assert!(b.newly_created);
        assert_ne!(a.account.account_id, b.account.account_id);
    }

    #[tokio::test]
    async fn expired_assertion_never_reaches_the_store() {
        let svc = service(MemoryLinkStore::new());

        let err = svc.link(&mint_expired("ext-1")).await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::Verification(VerifyError::Expired)
        ));
        assert!(svc.account("ext-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wrong_audience_causes_no_store_mutation() {
        let svc = service(MemoryLinkStore::new());

        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: "ext-1".to_string(),
            iat: now - 60,
            exp: now + 3600,
            iss: ISSUER.to_string(),
            aud: "another-app".to_string(),
            wallet_address: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let err = svc.link(&RawAssertion::new(token)).await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::Verification(VerifyError::AudienceMismatch)
        ));
        assert!(svc.account("ext-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_outage_then_recovery_leaves_one_row() {
        let svc = service(FailingStore::failing(1));
        let token = mint("ext-1", None);

        let err = svc.link(&token).await.unwrap_err();
        assert!(matches!(err, LinkError::StoreUnavailable(_)));
        assert!(svc.account("ext-1").await.unwrap().is_none());

        let retry = svc.link(&token).await.unwrap();
        assert!(retry.newly_created);
        assert_eq!(retry.account.external_id, "ext-1");
    }

    #[tokio::test]
    async fn deadline_elapses_and_releases_the_identity_lock() {
        let svc = service(SlowOnceStore::new()).with_call_timeout(Duration::from_millis(50));
        let token = mint("ext-1", None);

        let err = svc.link(&token).await.unwrap_err();
        assert!(matches!(err, LinkError::Timeout));

        // The lock must not leak: a follow-up call gets through to the
        // (now fast) store and succeeds.
        let retry = svc.link(&token).await.unwrap();
        assert!(retry.newly_created);
    }
}
