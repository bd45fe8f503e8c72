//! # Medool Core
//!
//! Session lifecycle logic - no HTTP or platform code.
//!
//! This crate contains:
//! - The session state machine and its controller
//! - Port interfaces (traits) implemented by `medool-infra`
//!
//! ## Architecture Principles
//! - Depends only on `medool-common` and `medool-domain`
//! - All backend access goes through [`session::AuthApi`]
//! - Credentials are reached through the refresh coordinator, never directly

pub mod session;

pub use session::{AuthApi, SessionController, SessionError, SessionPhase, SessionState};
