//! Testing utilities shared by the workspace's test suites
//!
//! - **[`mocks`]**: scripted [`TokenExchange`](crate::auth::TokenExchange)
//!   and a failure-injecting durable store
//! - [`MockClock`] for deterministic expiry tests
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use medool_common::auth::{CredentialStore, Fingerprint, MemoryStore, Obfuscator};
//! use medool_common::testing::MockClock;
//!
//! let clock = MockClock::new();
//! let store = CredentialStore::with_clock(
//!     Arc::new(MemoryStore::new()),
//!     Obfuscator::new(&Fingerprint::detect("test")),
//!     Arc::new(clock.clone()),
//! );
//! store.set_access("token", 121);
//! clock.advance(Duration::from_secs(2));
//! assert!(store.is_access_expired());
//! ```

pub mod mocks;

pub use mocks::{test_user, FailingStore, MockTokenExchange};

pub use crate::auth::MemoryStore;
pub use crate::time::{Clock, MockClock, SystemClock};
