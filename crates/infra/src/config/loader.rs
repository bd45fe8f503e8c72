//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `MEDOOL_API_BASE_URL` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Either way the result is validated before it is returned.
//!
//! ## Environment Variables
//! - `MEDOOL_API_BASE_URL`: Backend base URL (required)
//! - `MEDOOL_API_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `MEDOOL_STORAGE_PATH`: Refresh-token file; `memory` keeps it in process
//! - `MEDOOL_KEYCHAIN_SERVICE`: Store the refresh token in the OS keychain
//! - `MEDOOL_EXPIRY_MARGIN_SECS`: Safety margin before access token expiry
//! - `MEDOOL_UPLOAD_MAX_RETRIES`: Upload retry budget
//! - `MEDOOL_UPLOAD_BASE_DELAY_MS`: First upload backoff delay
//! - `MEDOOL_LOG_LEVEL`: Tracing filter directive
//! - `MEDOOL_LOG_JSON`: JSON log lines (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./medool.toml`, `./medool.json`, `./config.toml`, `./config.json`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};
use std::str::FromStr;

use medool_domain::{ClientConfig, MedoolError, Result, StorageBackend};

use crate::errors::InfraError;

const CONFIG_FILE_NAMES: &[&str] = &["medool.toml", "medool.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `MedoolError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<ClientConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `MEDOOL_API_BASE_URL` is required; everything else keeps its default
/// when unset.
///
/// # Errors
/// Returns `MedoolError::Config` if the base URL is missing, a numeric
/// variable does not parse, or validation fails.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::new(env_var("MEDOOL_API_BASE_URL")?);

    if let Some(timeout) = env_parse::<u64>("MEDOOL_API_TIMEOUT_SECS")? {
        config.api.timeout_secs = timeout;
    }
    if let Some(margin) = env_parse::<u64>("MEDOOL_EXPIRY_MARGIN_SECS")? {
        config.session.expiry_margin_secs = margin;
    }
    if let Some(retries) = env_parse::<u32>("MEDOOL_UPLOAD_MAX_RETRIES")? {
        config.upload.max_retries = retries;
    }
    if let Some(delay) = env_parse::<u64>("MEDOOL_UPLOAD_BASE_DELAY_MS")? {
        config.upload.base_delay_ms = delay;
    }

    if let Ok(service) = std::env::var("MEDOOL_KEYCHAIN_SERVICE") {
        config.session.storage = StorageBackend::Keychain { service };
    } else if let Ok(path) = std::env::var("MEDOOL_STORAGE_PATH") {
        config.session.storage = if path.eq_ignore_ascii_case("memory") {
            StorageBackend::Memory
        } else {
            StorageBackend::File { path: PathBuf::from(path) }
        };
    }

    if let Ok(level) = std::env::var("MEDOOL_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("MEDOOL_LOG_JSON", config.logging.json);

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `MedoolError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MedoolError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MedoolError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;
    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents).map_err(InfraError::from)?),
        "json" => Ok(serde_json::from_str(contents).map_err(InfraError::from)?),
        _ => Err(MedoolError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    candidates_in(&roots).into_iter().find(|path| path.exists())
}

fn candidates_in(roots: &[PathBuf]) -> Vec<PathBuf> {
    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .collect()
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| MedoolError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional environment variable
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| MedoolError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
