//! Multipart bodies with upload progress
//!
//! A `reqwest` form is consumed when sent, so the gateway rebuilds it for
//! every transmission (first try, 401 replay, upload retry) from a cheaply
//! cloneable [`MultipartBody`].

use std::fmt;
use std::sync::Arc;

use futures::stream;
use medool_domain::DomainError;
use parking_lot::Mutex;
use reqwest::multipart::{Form, Part};
use reqwest::Body;

const CHUNK_SIZE: usize = 64 * 1024;

/// In-memory file to upload
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Arc<[u8]>,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self { file_name: file_name.into(), mime_type: mime_type.into(), bytes: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Callback receiving whole-number upload percentages
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

/// Coalesces progress so the callback only sees changes.
#[derive(Clone)]
pub struct ProgressReporter {
    callback: ProgressCallback,
    last: Arc<Mutex<Option<u8>>>,
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self { callback, last: Arc::new(Mutex::new(None)) }
    }

    /// Start of an attempt: always reports 0, even if 0 was the last value.
    pub fn reset(&self) {
        *self.last.lock() = Some(0);
        (self.callback)(0);
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        {
            let mut last = self.last.lock();
            if *last == Some(percent) {
                return;
            }
            *last = Some(percent);
        }
        (self.callback)(percent);
    }

    pub fn report_bytes(&self, sent: usize, total: usize) {
        self.report(percent_of(sent, total));
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter").field("last", &*self.last.lock()).finish_non_exhaustive()
    }
}

fn percent_of(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let percent = (sent.min(total) as u128 * 100) / total as u128;
    u8::try_from(percent).unwrap_or(100)
}

/// Everything needed to rebuild a multipart form
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub field_name: String,
    pub file: UploadFile,
    pub fields: Vec<(String, String)>,
    pub progress: Option<ProgressReporter>,
}

impl MultipartBody {
    pub fn new(field_name: impl Into<String>, file: UploadFile) -> Self {
        Self { field_name: field_name.into(), file, fields: Vec::new(), progress: None }
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fresh form whose file part streams in chunks and reports progress
    /// as the transport pulls them.
    ///
    /// # Errors
    /// `Unknown` when the MIME type is not a valid header value.
    pub fn to_form(&self) -> Result<Form, DomainError> {
        let total = self.file.len();
        let bytes = Arc::clone(&self.file.bytes);
        let progress = self.progress.clone();

        let chunks = stream::iter((0..total).step_by(CHUNK_SIZE).map(move |start| {
            let end = (start + CHUNK_SIZE).min(total);
            if let Some(progress) = &progress {
                progress.report_bytes(end, total);
            }
            Ok::<Vec<u8>, std::io::Error>(bytes[start..end].to_vec())
        }));

        let part = Part::stream_with_length(Body::wrap_stream(chunks), total as u64)
            .file_name(self.file.file_name.clone())
            .mime_str(&self.file.mime_type)
            .map_err(|err| {
                DomainError::unknown(format!("invalid MIME type {}: {err}", self.file.mime_type))
            })?;

        let form = self
            .fields
            .iter()
            .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()));

        Ok(form.part(self.field_name.clone(), part))
    }
}
