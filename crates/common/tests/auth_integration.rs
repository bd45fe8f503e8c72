//! Integration tests for auth module
//!
//! Exercises the credential store, obfuscation, durable backends and the
//! single-flight refresh coordinator together, using the mocks from
//! `medool_common::testing`.

#![cfg(feature = "test-utils")]

use std::sync::Arc;
use std::time::Duration;

use medool_common::auth::{
    CredentialStore, DurableStore, FileStore, Fingerprint, MemoryStore, Obfuscator,
    RefreshCoordinator, TokenExchangeError, REFRESH_TOKEN_KEY,
};
use medool_common::testing::{test_user, FailingStore, MockClock, MockTokenExchange};
use tempfile::TempDir;

fn fingerprint() -> Fingerprint {
    Fingerprint {
        user_agent: "Mozilla/5.0 (Linux; Android 14) medool".to_string(),
        language: "en-IN".to_string(),
        color_depth: 24,
        timezone_offset_minutes: -330,
    }
}

fn credential_store(durable: Arc<dyn DurableStore>) -> (Arc<CredentialStore>, MockClock) {
    let clock = MockClock::new();
    let store = CredentialStore::with_clock(
        durable,
        Obfuscator::new(&fingerprint()),
        Arc::new(clock.clone()),
    );
    (Arc::new(store), clock)
}

/// Validates at-most-one refresh under concurrent load.
///
/// # Test Steps
/// 1. Store a refresh token and an already-expired access token
/// 2. Fire 16 concurrent `get_valid_access_token` calls from spawned tasks
/// 3. Verify the backend exchange ran exactly once
/// 4. Verify every caller received the same new token
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expiry_triggers_single_refresh() {
    let (store, clock) = credential_store(Arc::new(MemoryStore::new()));
    store.store_refresh("refresh-0").await.expect("store refresh");
    store.set_access("stale", 121);
    clock.advance(Duration::from_secs(5));
    assert!(store.is_access_expired());

    let exchange = Arc::new(MockTokenExchange::succeeding().with_delay(Duration::from_millis(50)));
    let coordinator = RefreshCoordinator::new(Arc::clone(&store), exchange.clone());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.get_valid_access_token().await })
        })
        .collect();

    for handle in handles {
        let token = handle.await.expect("task panicked");
        assert_eq!(token.as_deref(), Some("access-1"));
    }
    assert_eq!(exchange.calls(), 1);
    assert_eq!(exchange.received_tokens(), vec!["refresh-0".to_string()]);
}

/// Validates refresh token rotation.
///
/// # Test Steps
/// 1. Refresh twice in sequence
/// 2. Verify each exchange presented the token issued by the previous one
/// 3. Verify the original token is no longer retrievable
#[tokio::test]
async fn test_refresh_rotates_durable_token() {
    let (store, _) = credential_store(Arc::new(MemoryStore::new()));
    store.store_refresh("refresh-0").await.expect("store refresh");

    let exchange = Arc::new(MockTokenExchange::succeeding());
    let coordinator = RefreshCoordinator::new(Arc::clone(&store), exchange.clone());

    assert_eq!(coordinator.refresh_access_token().await.as_deref(), Some("access-1"));
    assert_eq!(store.refresh_token().await.as_deref(), Some("refresh-1"));

    assert_eq!(coordinator.refresh_access_token().await.as_deref(), Some("access-2"));
    assert_eq!(exchange.received_tokens(), vec!["refresh-0".to_string(), "refresh-1".to_string()]);
    assert_ne!(store.refresh_token().await.as_deref(), Some("refresh-0"));
}

/// Validates that a rejected refresh clears the session.
///
/// # Test Steps
/// 1. Store credentials, script the exchange to reject
/// 2. Verify the refresh yields `None`
/// 3. Verify both access and refresh state are gone
#[tokio::test]
async fn test_rejected_refresh_clears_all_credentials() {
    let (store, _) = credential_store(Arc::new(MemoryStore::new()));
    store.store_refresh("refresh-0").await.expect("store refresh");
    store.set_access("stale", 0);

    let exchange = Arc::new(MockTokenExchange::rejecting());
    let coordinator = RefreshCoordinator::new(Arc::clone(&store), exchange);

    assert_eq!(coordinator.get_valid_access_token().await, None);
    assert!(store.access_token().is_none());
    assert!(!store.has_refresh().await);
}

/// Validates the session returned alongside the refreshed token.
#[tokio::test]
async fn test_refresh_session_carries_user() {
    let (store, _) = credential_store(Arc::new(MemoryStore::new()));
    store.store_refresh("refresh-0").await.expect("store refresh");
    let coordinator =
        RefreshCoordinator::new(Arc::clone(&store), Arc::new(MockTokenExchange::succeeding()));

    let session = coordinator.refresh_session().await.expect("session");
    assert_eq!(session.user, test_user());
    assert_eq!(store.valid_access_token().as_deref(), Some(session.access_token.as_str()));
}

/// Validates that a refresh token that cannot be persisted does not lose the
/// new access token.
///
/// # Test Steps
/// 1. Seed a refresh token, then make writes fail
/// 2. Refresh
/// 3. Verify the access token is returned and stored in memory
#[tokio::test]
async fn test_rotation_write_failure_is_not_fatal() {
    let durable = Arc::new(FailingStore::default());
    let (store, _) = credential_store(durable.clone());
    store.store_refresh("refresh-0").await.expect("store refresh");
    durable.set_fail_writes(true);

    let coordinator =
        RefreshCoordinator::new(Arc::clone(&store), Arc::new(MockTokenExchange::succeeding()));

    assert_eq!(coordinator.refresh_access_token().await.as_deref(), Some("access-1"));
    assert_eq!(store.valid_access_token().as_deref(), Some("access-1"));
}

/// Validates fail-open reads and error-reporting writes against an
/// unavailable backend.
#[tokio::test]
async fn test_unavailable_storage_reads_as_no_session() {
    let (store, _) = credential_store(Arc::new(FailingStore::unavailable()));

    assert!(store.store_refresh("refresh-0").await.is_err());
    assert_eq!(store.refresh_token().await, None);
    assert!(!store.has_refresh().await);
    store.clear_all().await;
}

/// Validates that a token persisted on disk survives a restart and stays
/// bound to the device fingerprint.
///
/// # Test Steps
/// 1. Persist through a `FileStore` in a temp dir
/// 2. Reopen with a fresh store and the same fingerprint; token is readable
/// 3. Reopen with a different fingerprint; token reads as absent or different
#[tokio::test]
async fn test_file_backed_token_survives_restart() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("medool").join("auth.json");

    let (first, _) = credential_store(Arc::new(FileStore::new(&path)));
    first.store_refresh("refresh-on-disk").await.expect("store refresh");

    let raw = std::fs::read_to_string(&path).expect("read file");
    assert!(raw.contains(REFRESH_TOKEN_KEY));
    assert!(!raw.contains("refresh-on-disk"));

    let (reopened, _) = credential_store(Arc::new(FileStore::new(&path)));
    assert_eq!(reopened.refresh_token().await.as_deref(), Some("refresh-on-disk"));

    let mut other_device = fingerprint();
    other_device.user_agent = "another device".to_string();
    let foreign = CredentialStore::new(
        Arc::new(FileStore::new(&path)),
        Obfuscator::new(&other_device),
    );
    assert_ne!(foreign.refresh_token().await.as_deref(), Some("refresh-on-disk"));
}

/// Validates that failed refreshes do not leave the coordinator pending.
#[tokio::test]
async fn test_transport_failure_then_recovery() {
    let (store, _) = credential_store(Arc::new(MemoryStore::new()));
    store.store_refresh("refresh-0").await.expect("store refresh");

    let exchange = Arc::new(MockTokenExchange::failing(TokenExchangeError::Transport(
        "connection reset".to_string(),
    )));
    let coordinator = RefreshCoordinator::new(Arc::clone(&store), exchange.clone());

    assert_eq!(coordinator.refresh_access_token().await, None);
    assert!(!coordinator.is_refreshing());

    exchange.set_failure(None);
    store.store_refresh("refresh-after-login").await.expect("store refresh");
    assert_eq!(coordinator.refresh_access_token().await.as_deref(), Some("access-2"));
}
