//! Seams between the credential layer and the outside world
//!
//! The backend exchange and the durable store are traits so the refresh
//! coordinator and credential store can be driven by in-memory doubles in
//! tests.

use async_trait::async_trait;

use super::storage::{StorageError, StoredRecord};
use super::types::{TokenExchangeError, TokenGrant};

/// Exchanges a refresh token for a new token grant
///
/// Implementations must not route through the authenticated gateway, or a
/// rejected refresh would re-enter the refresh path.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    /// Trade `refresh_token` for a fresh access/refresh pair.
    ///
    /// # Errors
    /// Returns `TokenExchangeError` when the backend rejects the token, no
    /// response arrives, or the body is not a grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenExchangeError>;
}

/// Key/value persistence that survives a restart
///
/// Mirrors a single object store: records are addressed by `key` and `clear`
/// removes everything the store holds.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Insert or replace the record under `record.key`.
    async fn put(&self, record: StoredRecord) -> Result<(), StorageError>;

    /// Fetch a record; `Ok(None)` when absent.
    async fn get(&self, key: &str) -> Result<Option<StoredRecord>, StorageError>;

    /// Remove a record. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every record.
    async fn clear(&self) -> Result<(), StorageError>;
}
