//! File uploads: pre-upload compression and the retrying multipart pipeline

pub mod compression;
pub mod pipeline;

pub use compression::{
    format_file_size, CompressionError, CompressionResult, Compressor, ALLOWED_TYPES,
};
pub use pipeline::{
    retry_message, PrescriptionUpload, RetryCallback, TransientOnly, UploadOutcome,
    UploadPipeline, UploadRequest, PRESCRIPTIONS_PATH,
};
