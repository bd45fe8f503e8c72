//! Scripted `AuthApi` implementation

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use medool_common::auth::{TokenGrant, User};
use medool_core::AuthApi;
use medool_domain::{DomainError, OtpRequest, OtpResponse, OtpVerification, Profile};
use parking_lot::Mutex;

/// In-memory `AuthApi` with scripted responses and call recording.
pub struct MockAuthApi {
    verify: Mutex<Result<TokenGrant, DomainError>>,
    profiles: Mutex<Result<Vec<Profile>, DomainError>>,
    logout: Mutex<Result<(), DomainError>>,
    otp_requests: Mutex<Vec<OtpRequest>>,
    logout_tokens: Mutex<Vec<String>>,
    profile_fetches: AtomicU32,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self {
            verify: Mutex::new(Ok(grant("login-access", "login-refresh"))),
            profiles: Mutex::new(Ok(Vec::new())),
            logout: Mutex::new(Ok(())),
            otp_requests: Mutex::new(Vec::new()),
            logout_tokens: Mutex::new(Vec::new()),
            profile_fetches: AtomicU32::new(0),
        }
    }

    pub fn with_profiles(self, profiles: Vec<Profile>) -> Self {
        *self.profiles.lock() = Ok(profiles);
        self
    }

    pub fn set_profiles(&self, profiles: Result<Vec<Profile>, DomainError>) {
        *self.profiles.lock() = profiles;
    }

    pub fn set_verify(&self, result: Result<TokenGrant, DomainError>) {
        *self.verify.lock() = result;
    }

    pub fn set_logout(&self, result: Result<(), DomainError>) {
        *self.logout.lock() = result;
    }

    pub fn otp_requests(&self) -> Vec<OtpRequest> {
        self.otp_requests.lock().clone()
    }

    pub fn logout_tokens(&self) -> Vec<String> {
        self.logout_tokens.lock().clone()
    }

    pub fn profile_fetches(&self) -> u32 {
        self.profile_fetches.load(Ordering::SeqCst)
    }
}

pub fn login_user() -> User {
    User { id: "user-42".to_string(), phone: "+919812345678".to_string(), is_active: true }
}

pub fn grant(access: &str, refresh: &str) -> TokenGrant {
    TokenGrant {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_in: 900,
        user: login_user(),
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn request_otp(&self, request: &OtpRequest) -> Result<OtpResponse, DomainError> {
        self.otp_requests.lock().push(request.clone());
        Ok(OtpResponse { status: "otp_sent".to_string() })
    }

    async fn verify_otp(&self, _verification: &OtpVerification) -> Result<TokenGrant, DomainError> {
        self.verify.lock().clone()
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), DomainError> {
        self.logout_tokens.lock().push(refresh_token.to_string());
        self.logout.lock().clone()
    }

    async fn fetch_profiles(&self) -> Result<Vec<Profile>, DomainError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        self.profiles.lock().clone()
    }
}
