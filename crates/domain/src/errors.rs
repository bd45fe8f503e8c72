//! Error types used throughout the application
//!
//! Two layers live here:
//! - [`MedoolError`]: infrastructure failures (configuration, storage,
//!   transport setup) raised while wiring or running the client.
//! - [`DomainError`]: the normalized outcome of a failed backend call. Every
//!   gateway failure is mapped into this shape before it reaches a caller, so
//!   the UI only ever sees `user_message`.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::error_codes::{
    self, GENERIC_ERROR_MESSAGE, NETWORK_ERROR_MESSAGE, SESSION_EXPIRED_MESSAGE,
};

/// Main error type for Medool infrastructure
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MedoolError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Medool operations
pub type Result<T> = std::result::Result<T, MedoolError>;

/// Failure taxonomy for backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response reached the client (offline, DNS, connect, timeout).
    Network,
    /// 401-equivalent; the session could not be re-established.
    Authorization,
    /// Structured field errors.
    Validation,
    /// A server-declared domain code such as `quote_expired`.
    BusinessRule,
    /// 5xx responses.
    Server,
    /// Anything else, including non-2xx responses without an error envelope.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Network => "network",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::BusinessRule => "business-rule",
            Self::Server => "server",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Per-field validation messages, kept in the order the server sent them.
///
/// Order matters: the user-facing message surfaces the *first* offending
/// field, so this cannot be a hash map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append messages for a field. Repeated fields extend the existing entry.
    pub fn push(&mut self, field: impl Into<String>, messages: Vec<String>) {
        let field = field.into();
        if let Some((_, existing)) = self.entries.iter_mut().find(|(name, _)| *name == field) {
            existing.extend(messages);
        } else {
            self.entries.push((field, messages));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn first(&self) -> Option<(&str, &[String])> {
        self.entries.first().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.entries.iter().find(|(name, _)| name == field).map(|(_, messages)| messages.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}

impl<F: Into<String>> FromIterator<(F, Vec<String>)> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = (F, Vec<String>)>>(iter: I) -> Self {
        let mut errors = Self::new();
        for (field, messages) in iter {
            errors.push(field, messages);
        }
        errors
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, messages) in &self.entries {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldErrors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldErrorsVisitor;

        impl<'de> Visitor<'de> for FieldErrorsVisitor {
            type Value = FieldErrors;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of field names to lists of messages")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut errors = FieldErrors::new();
                while let Some((field, messages)) = access.next_entry::<String, Vec<String>>()? {
                    errors.push(field, messages);
                }
                Ok(errors)
            }
        }

        deserializer.deserialize_map(FieldErrorsVisitor)
    }
}

/// Normalized failure of a backend call.
///
/// `Display` renders only the user-facing message; the technical detail is
/// reserved for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{user_message}")]
pub struct DomainError {
    pub kind: ErrorKind,
    /// Server-supplied machine code, when the response carried an envelope.
    pub code: Option<String>,
    pub user_message: String,
    pub field_details: Option<FieldErrors>,
    /// HTTP status of the failing response, if one was received.
    pub status: Option<u16>,
    #[serde(skip)]
    pub technical: Option<String>,
}

impl DomainError {
    pub fn new(kind: ErrorKind, user_message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            user_message: user_message.into(),
            field_details: None,
            status: None,
            technical: None,
        }
    }

    /// No response reached the client.
    pub fn network(technical: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, NETWORK_ERROR_MESSAGE).with_technical(technical)
    }

    /// Refresh-and-replay could not restore the session.
    pub fn session_expired() -> Self {
        Self::new(ErrorKind::Authorization, SESSION_EXPIRED_MESSAGE).with_status(401)
    }

    /// Catch-all with the generic display message.
    pub fn unknown(technical: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, GENERIC_ERROR_MESSAGE).with_technical(technical)
    }

    /// Error derived from a server error envelope code.
    pub fn from_code(kind: ErrorKind, code: impl Into<String>) -> Self {
        let code = code.into();
        let mut error = Self::new(kind, error_codes::message_for_code(Some(&code)));
        error.code = Some(code);
        error
    }

    /// Validation error carrying per-field details.
    pub fn validation(details: Option<FieldErrors>) -> Self {
        let message = error_codes::format_validation_error(details.as_ref());
        let mut error = Self::new(ErrorKind::Validation, message);
        error.code = Some(error_codes::VALIDATION_ERROR.to_string());
        error.field_details = details;
        error
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_technical(mut self, technical: impl Into<String>) -> Self {
        self.technical = Some(technical.into());
        self
    }

    /// Whether an idempotent operation may be retried after this failure.
    ///
    /// Transient failures are network errors and responses with status >= 500,
    /// 408 or 429.
    pub fn is_transient(&self) -> bool {
        if self.kind == ErrorKind::Network {
            return true;
        }
        matches!(self.status, Some(status) if status >= 500 || status == 408 || status == 429)
    }

    /// Field → first message map for inline form errors.
    pub fn field_messages(&self) -> Vec<(String, String)> {
        error_codes::parse_validation_errors(self.field_details.as_ref())
    }
}
