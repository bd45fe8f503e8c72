//! Runtime building blocks shared across Medool crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `runtime` (default): clock, credential store, refresh coordination,
//!   logout signal, retry executor
//! - `platform`: platform keychain backed durable storage
//! - `test-utils`: mocks for the credential seams

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod auth;
#[cfg(feature = "runtime")]
pub mod resilience;
#[cfg(feature = "runtime")]
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use auth::{
    CredentialStore, DurableStore, Fingerprint, LogoutSignal, Obfuscator, RefreshCoordinator,
    RefreshedSession, StorageError, TokenExchange, TokenExchangeError, TokenGrant, User,
};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryOutcome,
    RetryPolicy,
};
#[cfg(feature = "runtime")]
pub use time::{Clock, SystemClock};
