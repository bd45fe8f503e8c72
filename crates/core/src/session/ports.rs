//! Port interfaces for the session lifecycle
//!
//! These traits define the boundary between the session state machine and
//! the HTTP adapters in `medool-infra`.

use async_trait::async_trait;
use medool_common::auth::TokenGrant;
use medool_domain::{DomainError, OtpRequest, OtpResponse, OtpVerification, Profile};

/// Backend authentication and account endpoints
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/request-otp`
    async fn request_otp(&self, request: &OtpRequest) -> Result<OtpResponse, DomainError>;

    /// `POST /auth/verify-otp`; yields the initial token grant.
    async fn verify_otp(&self, verification: &OtpVerification) -> Result<TokenGrant, DomainError>;

    /// `POST /auth/logout`; revokes the refresh token server-side.
    async fn logout(&self, refresh_token: &str) -> Result<(), DomainError>;

    /// `GET /profiles` for the signed-in user.
    async fn fetch_profiles(&self) -> Result<Vec<Profile>, DomainError>;
}
