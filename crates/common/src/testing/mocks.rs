//! Test doubles for the credential layer seams
//!
//! - [`MockTokenExchange`]: scripted refresh endpoint with call counting
//! - [`FailingStore`]: durable store whose operations can be made to fail

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{
    DurableStore, MemoryStore, StorageError, StoredRecord, TokenExchange, TokenExchangeError,
    TokenGrant, User,
};

/// Default user returned by [`MockTokenExchange`]
pub fn test_user() -> User {
    User { id: "user-1".to_string(), phone: "+919876543210".to_string(), is_active: true }
}

/// Scripted [`TokenExchange`]
///
/// Successful call `n` (1-based) issues `access-{n}` / `refresh-{n}`.
///
/// # Examples
///
/// ```
/// use medool_common::auth::TokenExchange;
/// use medool_common::testing::MockTokenExchange;
///
/// # tokio_test_block(async {
/// let exchange = MockTokenExchange::succeeding();
/// let grant = exchange.refresh("refresh-0").await.unwrap();
/// assert_eq!(grant.access_token, "access-1");
/// assert_eq!(exchange.calls(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug)]
pub struct MockTokenExchange {
    failure: Mutex<Option<TokenExchangeError>>,
    delay: Duration,
    expires_in: i64,
    user: User,
    calls: AtomicU32,
    received: Mutex<Vec<String>>,
}

impl MockTokenExchange {
    pub fn succeeding() -> Self {
        Self {
            failure: Mutex::new(None),
            delay: Duration::ZERO,
            expires_in: 900,
            user: test_user(),
            calls: AtomicU32::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: TokenExchangeError) -> Self {
        let exchange = Self::succeeding();
        *exchange.failure.lock() = Some(error);
        exchange
    }

    /// Backend rejection of the refresh token (HTTP 401).
    pub fn rejecting() -> Self {
        Self::failing(TokenExchangeError::Rejected {
            status: 401,
            code: Some("invalid_token".to_string()),
        })
    }

    /// Hold every call open for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn with_expires_in(mut self, expires_in: i64) -> Self {
        self.expires_in = expires_in;
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.user = user;
        self
    }

    /// Switch between failing (`Some`) and succeeding (`None`).
    pub fn set_failure(&self, failure: Option<TokenExchangeError>) {
        *self.failure.lock() = failure;
    }

    /// Number of exchanges attempted so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in call order.
    pub fn received_tokens(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

impl Default for MockTokenExchange {
    fn default() -> Self {
        Self::succeeding()
    }
}

#[async_trait]
impl TokenExchange for MockTokenExchange {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenExchangeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.received.lock().push(refresh_token.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }

        Ok(TokenGrant {
            access_token: format!("access-{call}"),
            refresh_token: format!("refresh-{call}"),
            expires_in: self.expires_in,
            user: self.user.clone(),
        })
    }
}

/// Durable store with switchable failures
///
/// Operations that are not failing delegate to an inner [`MemoryStore`].
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FailingStore {
    /// Every operation fails.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.set_fail_reads(true);
        store.set_fail_writes(true);
        store
    }

    /// `put`, `delete` and `clear` fail; `get` works.
    pub fn read_only() -> Self {
        let store = Self::default();
        store.set_fail_writes(true);
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check(flag: &AtomicBool, operation: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("{operation} disabled for test")));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FailingStore {
    async fn put(&self, record: StoredRecord) -> Result<(), StorageError> {
        Self::check(&self.fail_writes, "put")?;
        self.inner.put(record).await
    }

    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        Self::check(&self.fail_reads, "get")?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        Self::check(&self.fail_writes, "delete")?;
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Self::check(&self.fail_writes, "clear")?;
        self.inner.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_exchange_counts_and_records() {
        let exchange = MockTokenExchange::succeeding();

        let first = exchange.refresh("r0").await.unwrap();
        let second = exchange.refresh("r1").await.unwrap();

        assert_eq!(first.refresh_token, "refresh-1");
        assert_eq!(second.access_token, "access-2");
        assert_eq!(exchange.received_tokens(), vec!["r0".to_string(), "r1".to_string()]);
    }

    #[tokio::test]
    async fn mock_exchange_can_switch_to_failure() {
        let exchange = MockTokenExchange::succeeding();
        exchange.set_failure(Some(TokenExchangeError::Transport("offline".into())));

        assert!(matches!(exchange.refresh("r0").await, Err(TokenExchangeError::Transport(_))));
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test]
    async fn failing_store_respects_flags() {
        let store = FailingStore::read_only();
        assert!(store.get("k").await.unwrap().is_none());
        assert!(matches!(
            store.put(StoredRecord { key: "k".into(), value: "v".into(), created_at: 0 }).await,
            Err(StorageError::Unavailable(_))
        ));
        assert!(store.clear().await.is_err());

        store.set_fail_writes(false);
        store.clear().await.unwrap();
    }
}
