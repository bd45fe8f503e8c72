//! One-time-passcode login payloads

use serde::{Deserialize, Serialize};

/// Why an OTP is being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OtpPurpose {
    Login,
}

/// Body of `POST /auth/request-otp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRequest {
    pub phone: String,
    pub purpose: OtpPurpose,
}

impl OtpRequest {
    pub fn login(phone: impl Into<String>) -> Self {
        Self { phone: phone.into(), purpose: OtpPurpose::Login }
    }
}

/// Response of `POST /auth/request-otp` (`"sent"` or `"otp_sent"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpResponse {
    pub status: String,
}

/// Body of `POST /auth/verify-otp`; the backend takes no purpose here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpVerification {
    pub phone: String,
    pub otp: String,
}
