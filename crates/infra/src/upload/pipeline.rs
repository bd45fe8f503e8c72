//! Resilient upload pipeline
//!
//! Multipart uploads through the gateway with bounded exponential backoff.
//! Only transient failures (network, 5xx, 408, 429) are retried; anything
//! else surfaces after the first attempt.
//!
//! Per retry, in order: the retry hook fires, the backoff elapses, and the
//! next attempt starts by reporting progress 0. Progress is therefore
//! monotonic within an attempt only.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use medool_common::resilience::{
    BackoffStrategy, RetryConfig, RetryDecision, RetryError, RetryExecutor, RetryPolicy,
};
use medool_domain::{DomainError, Prescription, PrescriptionSource, UploadConfig};
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use super::compression::Compressor;
use crate::api::{ApiClient, MultipartBody, ProgressCallback, ProgressReporter, UploadFile};

pub const PRESCRIPTIONS_PATH: &str = "/prescriptions";

/// Retry hook: `(attempt, error)` where `attempt` counts failed attempts so
/// far, starting at 1.
pub type RetryCallback = Arc<dyn Fn(u32, &DomainError) + Send + Sync>;

/// `"Retrying upload (1/3)..."`
pub fn retry_message(attempt: u32, max_retries: u32) -> String {
    format!("Retrying upload ({attempt}/{max_retries})...")
}

/// Retries exactly the failures [`DomainError::is_transient`] accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientOnly;

impl RetryPolicy<DomainError> for TransientOnly {
    fn should_retry(&self, error: &DomainError, _attempt: u32) -> RetryDecision {
        if error.is_transient() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// One upload
#[derive(Clone)]
pub struct UploadRequest {
    pub path: String,
    pub file: UploadFile,
    pub fields: Vec<(String, String)>,
    pub on_progress: Option<ProgressCallback>,
    pub on_retry: Option<RetryCallback>,
}

impl UploadRequest {
    pub fn new(path: impl Into<String>, file: UploadFile) -> Self {
        Self { path: path.into(), file, fields: Vec::new(), on_progress: None, on_retry: None }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_retry(
        mut self,
        callback: impl Fn(u32, &DomainError) + Send + Sync + 'static,
    ) -> Self {
        self.on_retry = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("path", &self.path)
            .field("file", &self.file)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Successful upload
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome<T> {
    pub data: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
}

/// Prescription metadata sent alongside the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrescriptionUpload {
    pub profile_id: String,
    pub title: Option<String>,
    pub note: Option<String>,
}

/// Uploads with retry
pub struct UploadPipeline {
    client: Arc<ApiClient>,
    executor: RetryExecutor<TransientOnly>,
    compressor: Compressor,
    field_name: String,
}

impl fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPipeline")
            .field("retry", self.executor.config())
            .field("field_name", &self.field_name)
            .finish_non_exhaustive()
    }
}

impl UploadPipeline {
    /// # Errors
    /// `InvalidConfiguration` when the retry settings are unusable.
    pub fn new(client: Arc<ApiClient>, config: &UploadConfig) -> Result<Self, RetryError<()>> {
        let retry = RetryConfig::builder()
            .max_retries(config.max_retries)
            .exponential_backoff(
                Duration::from_millis(config.base_delay_ms),
                2.0,
                Duration::from_secs(60),
            )
            .build()?;
        let compressor = Compressor::new(config.compression.clone());
        Ok(Self::with_parts(client, retry, compressor, &config.field_name))
    }

    pub fn with_parts(
        client: Arc<ApiClient>,
        retry: RetryConfig,
        compressor: Compressor,
        field_name: &str,
    ) -> Self {
        Self {
            client,
            executor: RetryExecutor::new(retry, TransientOnly),
            compressor,
            field_name: field_name.to_string(),
        }
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    pub fn max_retries(&self) -> u32 {
        self.executor.config().max_attempts.saturating_sub(1)
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.executor.config().backoff
    }

    /// Upload `request.file` to `request.path`.
    ///
    /// # Errors
    /// The first non-transient error, or the last error once retries are
    /// exhausted.
    #[instrument(skip_all, fields(path = %request.path, file_name = %request.file.file_name))]
    pub async fn upload<T: DeserializeOwned>(
        &self,
        request: UploadRequest,
    ) -> Result<UploadOutcome<T>, DomainError> {
        let UploadRequest { path, file, fields, on_progress, on_retry } = request;

        let progress = on_progress.map(ProgressReporter::new);
        let mut body = MultipartBody::new(self.field_name.clone(), file);
        body.fields = fields;
        if let Some(progress) = &progress {
            body = body.with_progress(progress.clone());
        }

        let outcome = self
            .executor
            .execute_with_outcome(
                || self.client.send_multipart::<T>(&path, body.clone()),
                |retry, error, delay| {
                    warn!(
                        retry,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        technical = error.technical.as_deref().unwrap_or_default(),
                        "upload attempt failed; retrying"
                    );
                    if let Some(on_retry) = &on_retry {
                        on_retry(retry, error);
                    }
                },
            )
            .await;

        match outcome.result {
            Ok(data) => {
                if let Some(progress) = &progress {
                    progress.report(100);
                }
                info!(attempts = outcome.attempts, "upload complete");
                Ok(UploadOutcome { data, attempts: outcome.attempts })
            }
            Err(err) => {
                warn!(attempts = outcome.attempts, "upload failed");
                Err(match err {
                    RetryError::AttemptsExhausted { last, .. } => last,
                    RetryError::NonRetryable { source } => source,
                    RetryError::InvalidConfiguration { message } => DomainError::unknown(message),
                })
            }
        }
    }

    /// Compress and upload a prescription scan for `metadata.profile_id`.
    ///
    /// Files the compressor rejects fail with a `Validation` error before
    /// anything is sent.
    ///
    /// # Errors
    /// See [`Self::upload`].
    #[instrument(skip_all, fields(profile_id = %metadata.profile_id))]
    pub async fn upload_prescription(
        &self,
        file: UploadFile,
        metadata: PrescriptionUpload,
        on_progress: Option<ProgressCallback>,
        on_retry: Option<RetryCallback>,
    ) -> Result<UploadOutcome<Prescription>, DomainError> {
        let compressed = self.compressor.process(file).await?;
        info!(
            original = compressed.original_size,
            compressed = compressed.compressed_size,
            "prepared prescription file"
        );

        let mut request = UploadRequest::new(PRESCRIPTIONS_PATH, compressed.file)
            .with_field("profile_id", metadata.profile_id)
            .with_field("source", PrescriptionSource::Upload.as_str());
        if let Some(title) = metadata.title.filter(|title| !title.is_empty()) {
            request = request.with_field("title", title);
        }
        if let Some(note) = metadata.note.filter(|note| !note.is_empty()) {
            request = request.with_field("note", note);
        }
        request.on_progress = on_progress;
        request.on_retry = on_retry;

        self.upload(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_message_matches_toast_text() {
        assert_eq!(retry_message(1, 3), "Retrying upload (1/3)...");
        assert_eq!(retry_message(3, 3), "Retrying upload (3/3)...");
    }

    /// Validates the retry policy against the transient classification.
    ///
    /// Assertions:
    /// - Network, 5xx, 408 and 429 retry.
    /// - Validation (422) and other 4xx stop.
    #[test]
    fn transient_only_policy() {
        use medool_domain::ErrorKind;

        let policy = TransientOnly;
        let retry = |error: DomainError| {
            matches!(policy.should_retry(&error, 0), RetryDecision::Retry)
        };

        assert!(retry(DomainError::network("reset")));
        assert!(retry(DomainError::new(ErrorKind::Server, "x").with_status(503)));
        assert!(retry(DomainError::new(ErrorKind::Unknown, "x").with_status(408)));
        assert!(retry(DomainError::new(ErrorKind::BusinessRule, "x").with_status(429)));

        assert!(!retry(DomainError::validation(None).with_status(422)));
        assert!(!retry(DomainError::new(ErrorKind::Unknown, "x").with_status(404)));
        assert!(!retry(DomainError::session_expired()));
    }
}
