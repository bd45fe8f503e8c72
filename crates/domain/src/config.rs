//! Client configuration structures
//!
//! Loaded by `medool-infra::config::loader` from the environment or a
//! TOML/JSON file. Every section has defaults so a file only needs to name
//! what it overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{MedoolError, Result};

/// Endpoints reachable without a bearer token (matched by path prefix).
pub const DEFAULT_PUBLIC_ENDPOINTS: &[&str] =
    &["/auth/request-otp", "/auth/verify-otp", "/auth/refresh", "/cities", "/tests"];

const MAX_EXPIRY_MARGIN_SECS: u64 = 24 * 60 * 60;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Configuration with defaults for everything except the API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig::new(base_url),
            session: SessionConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Reject configurations the client cannot run with.
    ///
    /// # Errors
    /// Returns `MedoolError::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(MedoolError::Config("api.base_url must not be empty".into()));
        }
        url::Url::parse(base_url).map_err(|err| {
            MedoolError::Config(format!("api.base_url is not a valid URL ({base_url}): {err}"))
        })?;
        if self.api.timeout_secs == 0 {
            return Err(MedoolError::Config("api.timeout_secs must be greater than zero".into()));
        }
        if self.session.expiry_margin_secs > MAX_EXPIRY_MARGIN_SECS {
            return Err(MedoolError::Config(format!(
                "session.expiry_margin_secs must be at most {MAX_EXPIRY_MARGIN_SECS}"
            )));
        }
        if self.upload.field_name.trim().is_empty() {
            return Err(MedoolError::Config("upload.field_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Backend API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, e.g. `https://api.medool.in/v1` (no trailing slash needed)
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_public_endpoints")]
    pub public_endpoints: Vec<String>,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            public_endpoints: default_public_endpoints(),
        }
    }
}

/// Where the durable refresh token lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageBackend {
    /// JSON document on disk
    File { path: PathBuf },
    /// Platform keychain entry under the given service name
    Keychain { service: String },
    /// Process memory only; nothing survives a restart
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::File { path: PathBuf::from(".medool/auth.json") }
    }
}

/// Credential lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Subtracted from the server-declared access token lifetime.
    #[serde(default = "default_expiry_margin_secs")]
    pub expiry_margin_secs: u64,
    #[serde(default)]
    pub storage: StorageBackend,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_margin_secs: default_expiry_margin_secs(),
            storage: StorageBackend::default(),
        }
    }
}

/// Upload retry and compression settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_field_name")]
    pub field_name: String,
    #[serde(default)]
    pub compression: CompressionConfig,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            field_name: default_field_name(),
            compression: CompressionConfig::default(),
        }
    }
}

/// Thresholds for the pre-upload image pipeline (sizes in bytes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Images above this size are re-encoded.
    pub compress_above_bytes: u64,
    /// Re-encoded images still above this size are resized.
    pub resize_above_bytes: u64,
    /// Hard ceiling for any upload, images and PDFs alike.
    pub max_file_bytes: u64,
    /// Images wider or taller than this are rejected outright.
    pub max_dimension: u32,
    /// Bounding box used when resizing.
    pub resize_dimension: u32,
    pub initial_quality: u8,
    pub resize_quality: u8,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        const MIB: u64 = 1024 * 1024;
        Self {
            compress_above_bytes: 2 * MIB,
            resize_above_bytes: 5 * MIB,
            max_file_bytes: 10 * MIB,
            max_dimension: 4096,
            resize_dimension: 2048,
            initial_quality: 80,
            resize_quality: 75,
        }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("medool-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_public_endpoints() -> Vec<String> {
    DEFAULT_PUBLIC_ENDPOINTS.iter().map(|endpoint| (*endpoint).to_string()).collect()
}

fn default_expiry_margin_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_field_name() -> String {
    "file".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
