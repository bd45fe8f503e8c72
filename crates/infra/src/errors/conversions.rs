//! Conversions from external infrastructure errors into Medool errors.
//!
//! Two targets: [`MedoolError`] for wiring failures (config files, storage,
//! client construction) and [`DomainError`] for anything that happens while
//! talking to the backend. Raw `reqwest` errors never leave this crate.

use medool_common::auth::StorageError;
use medool_domain::{DomainError, MedoolError};
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the crate-spanning error.
#[derive(Debug)]
pub struct InfraError(pub MedoolError);

impl From<InfraError> for MedoolError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MedoolError> for InfraError {
    fn from(value: MedoolError) -> Self {
        Self(value)
    }
}

/// Makes the transport mapping explicit at call sites.
pub trait IntoDomainError {
    fn into_domain(self) -> DomainError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → DomainError */
/* -------------------------------------------------------------------------- */

impl IntoDomainError for HttpError {
    fn into_domain(self) -> DomainError {
        if self.is_builder() {
            return DomainError::unknown(format!("invalid request: {self}"));
        }
        if self.is_timeout() {
            return DomainError::network(format!("request timed out: {self}"));
        }
        if self.is_connect() {
            return DomainError::network(format!("connection failure: {self}"));
        }
        DomainError::network(self.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → MedoolError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        if value.is_builder() {
            return Self(MedoolError::Config(format!("HTTP client configuration: {value}")));
        }
        Self(MedoolError::Network(value.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* Storage, IO and format errors → MedoolError */
/* -------------------------------------------------------------------------- */

impl From<StorageError> for InfraError {
    fn from(value: StorageError) -> Self {
        Self(MedoolError::Storage(value.to_string()))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        Self(MedoolError::Config(format!("failed to read config file: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        Self(MedoolError::Config(format!("Invalid TOML format: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(MedoolError::Config(format!("Invalid JSON format: {value}")))
    }
}
