//! # Medool Domain
//!
//! Domain types for the Medool client session layer.
//!
//! This crate contains:
//! - Error taxonomy ([`DomainError`], [`ErrorKind`]) and infrastructure errors
//! - The backend error code → message table
//! - Wire types (profiles, OTP payloads, prescriptions, pages)
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other Medool crates
//! - No I/O

pub mod config;
pub mod error_codes;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
