//! Medool REST API access
//!
//! # Architecture
//!
//! - [`ApiClient`] is the authenticated request gateway; every backend call
//!   goes through it
//! - Bearer tokens come from an [`AccessTokenProvider`] (the refresh
//!   coordinator in production), never from the credential store directly
//! - Non-2xx responses are classified into `DomainError` by [`errors`]
//! - Refresh-token exchange uses the bare [`crate::http::HttpClient`] so it
//!   cannot re-enter the gateway's 401 handling

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod errors;
pub mod multipart;

pub use auth::{AccessTokenProvider, HttpAuthApi, HttpTokenExchange};
pub use client::{ApiClient, ApiRequest, RequestBody};
pub use endpoints::{Access, EndpointPolicy};
pub use errors::{classify_response, ErrorEnvelope};
pub use multipart::{MultipartBody, ProgressCallback, ProgressReporter, UploadFile};
