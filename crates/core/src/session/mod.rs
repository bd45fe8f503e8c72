//! Session lifecycle
//!
//! ```text
//! determining ──► unauthenticated ──login──► authenticated
//!      │                 ▲                        │
//!      └─────restore─────┼──────────────► ────────┘
//!                        └─logout / forced logout─┘
//! ```

pub mod controller;
pub mod ports;
pub mod state;

pub use controller::SessionController;
use medool_common::auth::StorageError;
use medool_domain::DomainError;
pub use ports::AuthApi;
pub use state::{SessionPhase, SessionState};
use thiserror::Error;

/// Session operation failure
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend call failed; carries the user-facing message.
    #[error(transparent)]
    Api(#[from] DomainError),

    /// Credentials could not be persisted.
    #[error("credential storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition { from: SessionPhase, to: SessionPhase },
}
