//! Token and account types shared by the credential layer
//!
//! [`TokenGrant`] is the body returned by both `POST /auth/verify-otp` and
//! `POST /auth/refresh`; every successful grant rotates the refresh token.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub phone: String,
    pub is_active: bool,
}

/// Access + refresh token pair issued by the backend
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Short-lived bearer credential
    pub access_token: String,

    /// Long-lived credential; replaces the previously stored one
    pub refresh_token: String,

    /// Server-declared access token lifetime in seconds
    pub expires_in: i64,

    pub user: User,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// Failure of a refresh-token exchange
///
/// The refresh coordinator never surfaces this to callers; it is logged and
/// turned into "no session".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenExchangeError {
    /// The backend answered with a non-success status (revoked, expired,
    /// reused refresh token).
    #[error("refresh rejected with status {status}")]
    Rejected { status: u16, code: Option<String> },

    /// No response reached the client.
    #[error("refresh transport failure: {0}")]
    Transport(String),

    /// A success status with a body that is not a token grant.
    #[error("refresh returned an invalid body: {0}")]
    InvalidResponse(String),
}
