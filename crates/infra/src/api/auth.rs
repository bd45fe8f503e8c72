//! Backend authentication adapters
//!
//! - [`AccessTokenProvider`]: what the gateway needs from the credential
//!   layer, implemented for [`RefreshCoordinator`].
//! - [`HttpTokenExchange`]: `POST /auth/refresh`, sent on the raw HTTP client
//!   so a refresh can never recurse into the gateway's own 401 handling.
//! - [`HttpAuthApi`]: the session controller's [`AuthApi`] port over the
//!   gateway.

use std::sync::Arc;

use async_trait::async_trait;
use medool_common::auth::{
    RefreshCoordinator, Renewal, TokenExchange, TokenExchangeError, TokenGrant,
};
use medool_core::AuthApi;
use medool_domain::{DomainError, OtpRequest, OtpResponse, OtpVerification, Profile};
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::client::ApiClient;
use super::errors::ErrorEnvelope;
use crate::http::HttpClient;

pub const REQUEST_OTP_PATH: &str = "/auth/request-otp";
pub const VERIFY_OTP_PATH: &str = "/auth/verify-otp";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const PROFILES_PATH: &str = "/profiles";

/// Source of bearer tokens for protected calls
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// A token believed to be valid, refreshing first if needed. `None` means
    /// there is no session.
    async fn access_token(&self) -> Option<String>;

    /// Called after the server rejected `rejected` with a 401.
    async fn renew_after_rejection(&self, rejected: Option<&str>) -> Renewal;
}

#[async_trait]
impl AccessTokenProvider for RefreshCoordinator {
    async fn access_token(&self) -> Option<String> {
        self.get_valid_access_token().await
    }

    async fn renew_after_rejection(&self, rejected: Option<&str>) -> Renewal {
        self.recover_from_rejection(rejected).await
    }
}

#[derive(Serialize)]
struct RefreshTokenBody<'a> {
    refresh_token: &'a str,
}

/// Refresh-token exchange over HTTP
#[derive(Debug, Clone)]
pub struct HttpTokenExchange {
    http: HttpClient,
    base_url: String,
}

impl HttpTokenExchange {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into().trim_end_matches('/').to_string() }
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, TokenExchangeError> {
        let url = format!("{}{REFRESH_PATH}", self.base_url);
        let request =
            self.http.request(Method::POST, &url).json(&RefreshTokenBody { refresh_token });

        let response = self.http.send(request).await.map_err(|err| {
            TokenExchangeError::Transport(err.technical.unwrap_or(err.user_message))
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| TokenExchangeError::Transport(err.to_string()))?;

        if !status.is_success() {
            let code = ErrorEnvelope::parse(&body).map(|envelope| envelope.error.code);
            debug!(status = status.as_u16(), code = code.as_deref(), "refresh rejected");
            return Err(TokenExchangeError::Rejected { status: status.as_u16(), code });
        }

        serde_json::from_slice::<TokenGrant>(&body).map_err(|err| {
            warn!(error = %err, "refresh response is not a token grant");
            TokenExchangeError::InvalidResponse(err.to_string())
        })
    }
}

/// [`AuthApi`] backed by the request gateway
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: Arc<ApiClient>,
}

impl HttpAuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn request_otp(&self, request: &OtpRequest) -> Result<OtpResponse, DomainError> {
        self.client.post(REQUEST_OTP_PATH, request).await
    }

    async fn verify_otp(&self, verification: &OtpVerification) -> Result<TokenGrant, DomainError> {
        self.client.post(VERIFY_OTP_PATH, verification).await
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), DomainError> {
        let _: serde_json::Value =
            self.client.post(LOGOUT_PATH, &RefreshTokenBody { refresh_token }).await?;
        Ok(())
    }

    async fn fetch_profiles(&self) -> Result<Vec<Profile>, DomainError> {
        self.client.get(PROFILES_PATH).await
    }
}
