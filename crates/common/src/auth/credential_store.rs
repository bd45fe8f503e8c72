//! Credential store
//!
//! Holds the two halves of a session:
//! - the access token, in memory only, with an expiry pulled forward by a
//!   safety margin so a token is never sent in its last seconds of life;
//! - the refresh token, obfuscated and written to a [`DurableStore`].
//!
//! The store is the only owner of this state. The refresh coordinator and the
//! session controller mutate it through the methods below and nothing else
//! reaches into it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::obfuscation::Obfuscator;
use super::storage::{StorageError, StoredRecord, REFRESH_TOKEN_KEY};
use super::traits::DurableStore;
use super::types::TokenGrant;
use crate::time::{Clock, SystemClock};

/// Default safety margin subtracted from the server-declared lifetime.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(120);

#[derive(Clone)]
struct AccessToken {
    token: String,
    expires_at_ms: i64,
}

/// In-memory access token plus durable refresh token
pub struct CredentialStore {
    durable: Arc<dyn DurableStore>,
    obfuscator: Obfuscator,
    clock: Arc<dyn Clock>,
    expiry_margin: Duration,
    access: RwLock<Option<AccessToken>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("expiry_margin", &self.expiry_margin)
            .field("has_access", &self.access.read().is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Store with the system clock and the default 120 second margin.
    pub fn new(durable: Arc<dyn DurableStore>, obfuscator: Obfuscator) -> Self {
        Self::with_clock(durable, obfuscator, Arc::new(SystemClock))
    }

    pub fn with_clock(
        durable: Arc<dyn DurableStore>,
        obfuscator: Obfuscator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            durable,
            obfuscator,
            clock,
            expiry_margin: DEFAULT_EXPIRY_MARGIN,
            access: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }

    pub fn expiry_margin(&self) -> Duration {
        self.expiry_margin
    }

    /// Keep `token` in memory; it counts as expired `expiry_margin` before
    /// the server says it does.
    pub fn set_access(&self, token: impl Into<String>, expires_in_secs: i64) {
        let margin_ms = i64::try_from(self.expiry_margin.as_millis()).unwrap_or(i64::MAX);
        let lifetime_ms = expires_in_secs.saturating_mul(1000).saturating_sub(margin_ms);
        let expires_at_ms = self.clock.millis_since_epoch().saturating_add(lifetime_ms);

        *self.access.write() = Some(AccessToken { token: token.into(), expires_at_ms });
        debug!(expires_in_secs, "access token stored");
    }

    /// Current access token, expired or not.
    pub fn access_token(&self) -> Option<String> {
        self.access.read().as_ref().map(|access| access.token.clone())
    }

    /// Current access token only when it has not expired.
    pub fn valid_access_token(&self) -> Option<String> {
        let now = self.clock.millis_since_epoch();
        self.access
            .read()
            .as_ref()
            .filter(|access| now < access.expires_at_ms)
            .map(|access| access.token.clone())
    }

    /// True when there is no access token or `now >= expiry`.
    pub fn is_access_expired(&self) -> bool {
        let now = self.clock.millis_since_epoch();
        self.access.read().as_ref().map_or(true, |access| now >= access.expires_at_ms)
    }

    pub fn clear_access(&self) {
        *self.access.write() = None;
    }

    /// Obfuscate and persist the refresh token, replacing any previous one.
    ///
    /// # Errors
    /// Returns the backend's `StorageError`; the caller decides whether a
    /// failed write is fatal.
    pub async fn store_refresh(&self, token: &str) -> Result<(), StorageError> {
        let record = StoredRecord {
            key: REFRESH_TOKEN_KEY.to_string(),
            value: self.obfuscator.obfuscate(token),
            created_at: self.clock.millis_since_epoch(),
        };
        self.durable.put(record).await?;
        debug!("refresh token persisted");
        Ok(())
    }

    /// Read and reveal the refresh token.
    ///
    /// Any failure (backend error, undecodable value) reads as "no session".
    pub async fn refresh_token(&self) -> Option<String> {
        let record = match self.durable.get(REFRESH_TOKEN_KEY).await {
            Ok(record) => record?,
            Err(err) => {
                warn!(error = %err, "refresh token read failed; treating as absent");
                return None;
            }
        };

        let revealed = self.obfuscator.reveal(&record.value);
        if revealed.is_none() {
            warn!("stored refresh token could not be decoded; treating as absent");
        }
        revealed.filter(|token| !token.is_empty())
    }

    pub async fn has_refresh(&self) -> bool {
        self.refresh_token().await.is_some()
    }

    /// Store both halves of a fresh grant.
    ///
    /// The access token is set before the durable write, so it stays usable
    /// for this process even if persisting the refresh token fails.
    ///
    /// # Errors
    /// Propagates the durable write failure.
    pub async fn store_grant(&self, grant: &TokenGrant) -> Result<(), StorageError> {
        self.set_access(grant.access_token.clone(), grant.expires_in);
        self.store_refresh(&grant.refresh_token).await
    }

    /// Forget everything. Safe to call with no session and safe to repeat.
    pub async fn clear_all(&self) {
        self.clear_access();
        if let Err(err) = self.durable.clear().await {
            warn!(error = %err, "durable credential clear failed");
        }
    }
}
