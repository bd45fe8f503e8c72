//! Single-flight token refresh
//!
//! The coordinator is a two-state machine, `Idle` or `InFlight(handle)`. The
//! first caller to find the access token expired records the in-flight
//! handle under a synchronous lock *before* anything is awaited, so every
//! caller arriving while the exchange is pending joins the same shared
//! future and exactly one exchange hits the backend.
//!
//! The exchange runs on its own task. A caller dropping its future does not
//! cancel the refresh; the result still lands in the credential store. The
//! task resets the state to `Idle` from a drop guard, so a failed or
//! panicked refresh never leaves later callers waiting on a dead handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::credential_store::CredentialStore;
use super::traits::TokenExchange;
use super::types::User;

type SharedRefresh = Shared<BoxFuture<'static, RefreshAttempt>>;

/// Result of a successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedSession {
    pub access_token: String,
    pub user: User,
}

/// Outcome of renewing credentials after the server rejected a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Renewal {
    Renewed(String),
    /// No token could be obtained. `report` is true for exactly one caller
    /// per refresh that discarded a stored session, so a lost session is
    /// announced once no matter how many requests were waiting on it.
    Expired { report: bool },
}

#[derive(Clone)]
struct RefreshAttempt {
    session: Option<RefreshedSession>,
    discarded_session: bool,
}

enum RefreshState {
    Idle,
    InFlight { generation: u64, operation: SharedRefresh },
}

struct Inner {
    store: Arc<CredentialStore>,
    exchange: Arc<dyn TokenExchange>,
    state: Mutex<RefreshState>,
    generation: AtomicU64,
    reported_generation: AtomicU64,
}

/// Resets the coordinator to `Idle` when the refresh task finishes, unless a
/// newer refresh has already replaced it.
struct InFlightReset {
    inner: Arc<Inner>,
    generation: u64,
}

impl Drop for InFlightReset {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        let current = match &*state {
            RefreshState::InFlight { generation, .. } => Some(*generation),
            RefreshState::Idle => None,
        };
        if current == Some(self.generation) {
            *state = RefreshState::Idle;
        }
    }
}

/// Cloneable handle to the single-flight refresh machinery
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(store: Arc<CredentialStore>, exchange: Arc<dyn TokenExchange>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                exchange,
                state: Mutex::new(RefreshState::Idle),
                generation: AtomicU64::new(0),
                reported_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.inner.store
    }

    /// Whether a refresh is currently pending.
    pub fn is_refreshing(&self) -> bool {
        matches!(&*self.inner.state.lock(), RefreshState::InFlight { .. })
    }

    /// Unexpired access token, refreshing first if needed.
    ///
    /// Returns `None` when there is no session to restore; credentials have
    /// been cleared in that case.
    pub async fn get_valid_access_token(&self) -> Option<String> {
        if let Some(token) = self.inner.store.valid_access_token() {
            return Some(token);
        }
        self.refresh_access_token().await
    }

    /// Exchange the refresh token for a new access token, joining any refresh
    /// already in flight.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Option<String> {
        self.refresh_session().await.map(|session| session.access_token)
    }

    /// Like [`Self::refresh_access_token`], but also yields the user the
    /// backend returned with the new grant.
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Option<RefreshedSession> {
        let (_, operation) = self.join_or_start();
        operation.await.session
    }

    /// Recover from a 401 on `rejected`.
    ///
    /// When another caller has already replaced the rejected token with a
    /// valid one, that token is reused instead of rotating again.
    pub async fn refresh_after_rejection(&self, rejected: &str) -> Option<String> {
        match self.recover_from_rejection(Some(rejected)).await {
            Renewal::Renewed(token) => Some(token),
            Renewal::Expired { .. } => None,
        }
    }

    /// Like [`Self::refresh_after_rejection`], but tells the caller whether
    /// it is the one that should announce the lost session.
    #[instrument(skip_all)]
    pub async fn recover_from_rejection(&self, rejected: Option<&str>) -> Renewal {
        if let Some(rejected) = rejected {
            if let Some(current) = self.inner.store.valid_access_token() {
                if current != rejected {
                    debug!("rejected token already replaced; reusing newer access token");
                    return Renewal::Renewed(current);
                }
            }
        }

        let (generation, operation) = self.join_or_start();
        let attempt = operation.await;
        if let Some(session) = attempt.session {
            return Renewal::Renewed(session.access_token);
        }

        let report = attempt.discarded_session
            && self.inner.reported_generation.fetch_max(generation, Ordering::SeqCst) < generation;
        Renewal::Expired { report }
    }

    fn join_or_start(&self) -> (u64, SharedRefresh) {
        let mut state = self.inner.state.lock();
        if let RefreshState::InFlight { generation, operation } = &*state {
            debug!("joining in-flight refresh");
            return (*generation, operation.clone());
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let task_inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let _reset = InFlightReset { inner: Arc::clone(&task_inner), generation };
            task_inner.perform_refresh().await
        });

        let operation = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => {
                    warn!(error = %err, "refresh task did not complete");
                    RefreshAttempt { session: None, discarded_session: false }
                }
            }
        }
        .boxed()
        .shared();

        *state = RefreshState::InFlight { generation, operation: operation.clone() };
        debug!(generation, "refresh started");
        (generation, operation)
    }
}

impl Inner {
    async fn perform_refresh(&self) -> RefreshAttempt {
        let Some(refresh_token) = self.store.refresh_token().await else {
            debug!("no refresh token stored; clearing credentials");
            self.store.clear_all().await;
            return RefreshAttempt { session: None, discarded_session: false };
        };

        match self.exchange.refresh(&refresh_token).await {
            Ok(grant) => {
                self.store.set_access(grant.access_token.clone(), grant.expires_in);
                if let Err(err) = self.store.store_refresh(&grant.refresh_token).await {
                    warn!(error = %err, "rotated refresh token could not be persisted");
                }
                info!(
                    user_id = %grant.user.id,
                    expires_in = grant.expires_in,
                    "access token refreshed"
                );
                let session =
                    RefreshedSession { access_token: grant.access_token, user: grant.user };
                RefreshAttempt { session: Some(session), discarded_session: false }
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed; clearing credentials");
                self.store.clear_all().await;
                RefreshAttempt { session: None, discarded_session: true }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::obfuscation::{Fingerprint, Obfuscator};
    use crate::auth::storage::MemoryStore;
    use crate::auth::types::{TokenExchangeError, TokenGrant};

    struct CountingExchange {
        calls: AtomicU64,
        fail: bool,
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenExchangeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail {
                return Err(TokenExchangeError::Rejected { status: 401, code: None });
            }
            Ok(TokenGrant {
                access_token: format!("access-{n}"),
                refresh_token: format!("{refresh_token}-next"),
                expires_in: 900,
                user: User { id: "u-1".into(), phone: "+910000000000".into(), is_active: true },
            })
        }
    }

    fn coordinator(fail: bool) -> (RefreshCoordinator, Arc<CountingExchange>) {
        let store = Arc::new(CredentialStore::new(
            Arc::new(MemoryStore::new()),
            Obfuscator::new(&Fingerprint {
                user_agent: "test".into(),
                language: "en".into(),
                color_depth: 24,
                timezone_offset_minutes: 0,
            }),
        ));
        let exchange = Arc::new(CountingExchange { calls: AtomicU64::new(0), fail });
        (RefreshCoordinator::new(store, exchange.clone()), exchange)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let (coordinator, exchange) = coordinator(false);
        coordinator.credentials().store_refresh("r0").await.unwrap();

        let results = futures::future::join_all(
            (0..8).map(|_| coordinator.get_valid_access_token()),
        )
        .await;

        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|token| token.as_deref() == Some("access-1")));
        assert!(!coordinator.is_refreshing());
        assert_eq!(coordinator.credentials().refresh_token().await.as_deref(), Some("r0-next"));
    }

    /// Validates that a failed refresh does not wedge the coordinator.
    ///
    /// Assertions:
    /// - The failure yields `None` and clears credentials.
    /// - The state returns to idle, so the next call starts a new refresh.
    #[tokio::test]
    async fn failed_refresh_resets_to_idle() {
        let (coordinator, exchange) = coordinator(true);
        coordinator.credentials().store_refresh("r0").await.unwrap();

        assert_eq!(coordinator.refresh_access_token().await, None);
        assert!(!coordinator.is_refreshing());
        assert!(!coordinator.credentials().has_refresh().await);

        coordinator.credentials().store_refresh("r1").await.unwrap();
        assert_eq!(coordinator.refresh_access_token().await, None);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_refresh_token_skips_exchange() {
        let (coordinator, exchange) = coordinator(false);

        assert_eq!(coordinator.get_valid_access_token().await, None);
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn valid_token_takes_fast_path() {
        let (coordinator, exchange) = coordinator(false);
        coordinator.credentials().set_access("cached", 900);

        assert_eq!(coordinator.get_valid_access_token().await.as_deref(), Some("cached"));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejection_reuses_newer_token() {
        let (coordinator, exchange) = coordinator(false);
        coordinator.credentials().set_access("newer", 900);

        assert_eq!(coordinator.refresh_after_rejection("older").await.as_deref(), Some("newer"));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 0);

        coordinator.credentials().store_refresh("r0").await.unwrap();
        assert_eq!(coordinator.refresh_after_rejection("newer").await.as_deref(), Some("access-1"));
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }

    /// Validates that a failed refresh is reported once to concurrent
    /// rejected callers.
    ///
    /// Assertions:
    /// - Every caller sees `Expired`.
    /// - Exactly one of them is asked to report the lost session.
    /// - Without a stored session nothing is reported.
    #[tokio::test]
    async fn failed_recovery_is_reported_once() {
        let (coordinator, exchange) = coordinator(true);
        coordinator.credentials().store_refresh("r0").await.unwrap();

        let renewals = futures::future::join_all(
            (0..5).map(|_| coordinator.recover_from_rejection(Some("stale"))),
        )
        .await;

        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
        let reports = renewals
            .iter()
            .filter(|renewal| **renewal == Renewal::Expired { report: true })
            .count();
        assert_eq!(reports, 1);
        assert!(renewals.iter().all(|renewal| matches!(renewal, Renewal::Expired { .. })));

        assert_eq!(
            coordinator.recover_from_rejection(Some("stale")).await,
            Renewal::Expired { report: false }
        );
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn abandoned_waiter_does_not_cancel_refresh() {
        let (coordinator, exchange) = coordinator(false);
        coordinator.credentials().store_refresh("r0").await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(1), coordinator.refresh_session()).await;
        assert!(abandoned.is_err());

        let session = coordinator.refresh_session().await.unwrap();
        assert_eq!(session.access_token, "access-1");
        assert_eq!(session.user.id, "u-1");
        assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
    }
}
