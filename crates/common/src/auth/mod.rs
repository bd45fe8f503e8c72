//! Client-side credential lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  RefreshCoordinator  │  single-flight refresh, never errors to callers
//! └──────────┬───────────┘
//!            │
//!            ├──► TokenExchange     (backend refresh call, trait)
//!            │
//!            └──► CredentialStore   (access in memory, refresh durable)
//!                      │
//!                      ├──► Obfuscator    (device-bound XOR + base64)
//!                      └──► DurableStore  (memory / file / keychain)
//! ```
//!
//! [`LogoutSignal`] is the broadcast the gateway raises when a session
//! cannot be restored.
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use medool_common::auth::{
//!     CredentialStore, Fingerprint, MemoryStore, Obfuscator, RefreshCoordinator, TokenExchange,
//! };
//!
//! async fn bearer(exchange: Arc<dyn TokenExchange>) -> Option<String> {
//!     let store = Arc::new(CredentialStore::new(
//!         Arc::new(MemoryStore::new()),
//!         Obfuscator::new(&Fingerprint::detect("medool-client")),
//!     ));
//!     let coordinator = RefreshCoordinator::new(store, exchange);
//!
//!     // Cached token if still valid, otherwise one shared refresh.
//!     coordinator.get_valid_access_token().await
//! }
//! ```
//!
//! # Known limitation
//!
//! The persisted refresh token is obfuscated, not encrypted. It deters
//! casual inspection of the storage backend only.

pub mod credential_store;
pub mod obfuscation;
pub mod refresh;
pub mod signal;
pub mod storage;
pub mod traits;
pub mod types;

pub use credential_store::{CredentialStore, DEFAULT_EXPIRY_MARGIN};
pub use obfuscation::{device_key, Fingerprint, Obfuscator};
pub use refresh::{RefreshCoordinator, RefreshedSession, Renewal};
pub use signal::LogoutSignal;
#[cfg(feature = "platform")]
pub use storage::KeyringStore;
pub use storage::{FileStore, MemoryStore, StorageError, StoredRecord, REFRESH_TOKEN_KEY};
pub use traits::{DurableStore, TokenExchange};
pub use types::{TokenExchangeError, TokenGrant, User};
