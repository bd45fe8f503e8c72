//! # Medool Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The authenticated request gateway over `reqwest`
//! - Backend adapters for the session controller and token refresh
//! - The compressing, retrying upload pipeline
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `medool-core` and `medool-common`
//! - Depends on `medool-domain`, `medool-common` and `medool-core`
//! - Contains all "impure" code (network, filesystem, keychain)

pub mod api;
pub mod config;
pub mod context;
pub mod errors;
pub mod http;
pub mod observability;
pub mod upload;

// Re-export commonly used items
pub use api::{ApiClient, ApiRequest, EndpointPolicy, HttpAuthApi, HttpTokenExchange, UploadFile};
pub use context::MedoolClient;
pub use errors::{InfraError, IntoDomainError};
pub use http::{HttpClient, HttpClientBuilder};
pub use observability::init_tracing;
pub use upload::{
    retry_message, Compressor, PrescriptionUpload, UploadOutcome, UploadPipeline, UploadRequest,
};
