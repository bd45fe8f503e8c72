//! Pre-upload validation and image compression
//!
//! Pipeline for prescription scans:
//! 1. Only JPEG, PNG and PDF are accepted
//! 2. Images wider or taller than `max_dimension` are rejected
//! 3. PDFs pass through untouched unless they exceed `max_file_bytes`
//! 4. Images above `compress_above_bytes` are re-encoded as JPEG
//! 5. Still above `resize_above_bytes`: resized to fit `resize_dimension`
//! 6. Still above `max_file_bytes`: rejected
//!
//! Decoding and encoding are CPU-bound and run on the blocking pool.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use medool_domain::{CompressionConfig, DomainError, ErrorKind};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::UploadFile;

pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_PNG: &str = "image/png";
pub const MIME_PDF: &str = "application/pdf";
pub const ALLOWED_TYPES: &[&str] = &[MIME_JPEG, MIME_PNG, MIME_PDF];

const MIB: f64 = 1024.0 * 1024.0;

/// Why a file cannot be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("Please upload a JPEG, PNG, or PDF file.")]
    UnsupportedType { mime_type: String },

    #[error("Image is too large ({width}x{height}). Maximum allowed is {max}x{max}.")]
    Dimensions { width: u32, height: u32, max: u32 },

    #[error(
        "PDF file is too large ({}). Maximum size is {}.",
        display_size(.size),
        display_size(.max)
    )]
    PdfTooLarge { size: u64, max: u64 },

    #[error(
        "File is still too large after compression ({}). Please use a smaller image or lower resolution.",
        display_size(.size)
    )]
    StillTooLarge { size: u64 },

    #[error("Could not process this image. Please try another file.")]
    Image(String),

    #[error("Could not process this image. Please try another file.")]
    TaskJoin(String),
}

impl From<CompressionError> for DomainError {
    fn from(err: CompressionError) -> Self {
        let technical = match &err {
            CompressionError::UnsupportedType { mime_type } => {
                format!("unsupported type {mime_type}")
            }
            CompressionError::Image(detail) | CompressionError::TaskJoin(detail) => detail.clone(),
            other => other.to_string(),
        };
        Self::new(ErrorKind::Validation, err.to_string()).with_technical(technical)
    }
}

/// Output of [`Compressor::process`]
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionResult {
    pub file: UploadFile,
    pub original_size: u64,
    pub compressed_size: u64,
    /// `original_size / compressed_size`; 1.0 when untouched.
    pub ratio: f64,
}

impl CompressionResult {
    fn unchanged(file: UploadFile) -> Self {
        let size = file.len() as u64;
        Self { file, original_size: size, compressed_size: size, ratio: 1.0 }
    }
}

/// Validates and shrinks files before upload
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    config: CompressionConfig,
}

impl Compressor {
    pub fn new(config: CompressionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Run the full pipeline on the blocking pool.
    ///
    /// # Errors
    /// A [`CompressionError`] describing why the file cannot be uploaded.
    #[instrument(
        skip_all,
        fields(file_name = %file.file_name, mime_type = %file.mime_type, size = file.len())
    )]
    pub async fn process(&self, file: UploadFile) -> Result<CompressionResult, CompressionError> {
        let compressor = self.clone();
        tokio::task::spawn_blocking(move || compressor.process_blocking(file))
            .await
            .map_err(|err| CompressionError::TaskJoin(err.to_string()))?
    }

    /// Synchronous form of [`Self::process`].
    ///
    /// # Errors
    /// See [`Self::process`].
    pub fn process_blocking(
        &self,
        file: UploadFile,
    ) -> Result<CompressionResult, CompressionError> {
        validate_type(&file)?;
        let original_size = file.len() as u64;

        if file.mime_type == MIME_PDF {
            if original_size > self.config.max_file_bytes {
                return Err(CompressionError::PdfTooLarge {
                    size: original_size,
                    max: self.config.max_file_bytes,
                });
            }
            return Ok(CompressionResult::unchanged(file));
        }

        self.validate_dimensions(&file)?;

        if original_size <= self.config.compress_above_bytes {
            debug!("small enough; uploading as is");
            return Ok(CompressionResult::unchanged(file));
        }

        let image = image::load_from_memory(&file.bytes)
            .map_err(|err| CompressionError::Image(format!("decode failed: {err}")))?;

        let mut encoded = encode_jpeg(&image, self.config.initial_quality)?;
        debug!(size = encoded.len(), quality = self.config.initial_quality, "re-encoded");

        if encoded.len() as u64 > self.config.resize_above_bytes {
            let bound = self.config.resize_dimension;
            let resized = if image.width() > bound || image.height() > bound {
                image.resize(bound, bound, FilterType::Triangle)
            } else {
                image
            };
            encoded = encode_jpeg(&resized, self.config.resize_quality)?;
            debug!(
                size = encoded.len(),
                width = resized.width(),
                height = resized.height(),
                "resized"
            );
        }

        let compressed_size = encoded.len() as u64;
        if compressed_size > self.config.max_file_bytes {
            return Err(CompressionError::StillTooLarge { size: compressed_size });
        }

        let ratio = original_size as f64 / compressed_size.max(1) as f64;
        info!(original_size, compressed_size, ratio, "image compressed");

        Ok(CompressionResult {
            file: UploadFile::new(jpeg_file_name(&file.file_name), MIME_JPEG, encoded),
            original_size,
            compressed_size,
            ratio,
        })
    }

    /// Unreadable headers are let through; the server has the final say.
    fn validate_dimensions(&self, file: &UploadFile) -> Result<(), CompressionError> {
        let dimensions = ImageReader::new(Cursor::new(&file.bytes[..]))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());

        match dimensions {
            Some((width, height))
                if width > self.config.max_dimension || height > self.config.max_dimension =>
            {
                Err(CompressionError::Dimensions { width, height, max: self.config.max_dimension })
            }
            Some(_) => Ok(()),
            None => {
                debug!("could not read image dimensions");
                Ok(())
            }
        }
    }
}

fn validate_type(file: &UploadFile) -> Result<(), CompressionError> {
    if ALLOWED_TYPES.contains(&file.mime_type.as_str()) {
        Ok(())
    } else {
        Err(CompressionError::UnsupportedType { mime_type: file.mime_type.clone() })
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, CompressionError> {
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
    let mut buffer = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
        .map_err(|err| CompressionError::Image(format!("encode failed: {err}")))?;
    Ok(buffer)
}

fn jpeg_file_name(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("upload");
    format!("{stem}.jpg")
}

fn display_size(bytes: &u64) -> String {
    format_file_size(*bytes)
}

/// Human-readable size: `512 B`, `1.5 KB`, `3.2 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    if bytes < 1024 * 1024 {
        return format!("{:.1} KB", bytes as f64 / 1024.0);
    }
    format!("{:.1} MB", bytes as f64 / MIB)
}

#[cfg(test)]
mod tests {
    use image::{ImageFormat, RgbImage};

    use super::*;

    /// Noisy PNG so the encoded size is well above a few kilobytes.
    fn noisy_png(width: u32, height: u32) -> UploadFile {
        let mut seed: u32 = 0x2545_f491;
        let pixels = RgbImage::from_fn(width, height, |_, _| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let [r, g, b, _] = seed.to_le_bytes();
            image::Rgb([r, g, b])
        });
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(pixels).write_to(&mut bytes, ImageFormat::Png).unwrap();
        UploadFile::new("scan.png", MIME_PNG, bytes.into_inner())
    }

    fn config() -> CompressionConfig {
        CompressionConfig { compress_above_bytes: 1000, ..CompressionConfig::default() }
    }

    #[test]
    fn rejects_unsupported_types() {
        let file = UploadFile::new("notes.txt", "text/plain", b"hello".to_vec());
        let err = Compressor::default().process_blocking(file).unwrap_err();

        assert!(matches!(err, CompressionError::UnsupportedType { .. }));
        assert_eq!(err.to_string(), "Please upload a JPEG, PNG, or PDF file.");
    }

    #[test]
    fn pdf_passes_through_or_is_rejected_by_size() {
        let pdf = UploadFile::new("report.pdf", MIME_PDF, vec![b'%'; 4096]);
        let result = Compressor::default().process_blocking(pdf.clone()).unwrap();
        assert_eq!(result.file, pdf);
        assert!((result.ratio - 1.0).abs() < f64::EPSILON);

        let strict = Compressor::new(CompressionConfig { max_file_bytes: 1024, ..config() });
        let err = strict.process_blocking(pdf).unwrap_err();
        assert_eq!(err, CompressionError::PdfTooLarge { size: 4096, max: 1024 });
        assert_eq!(err.to_string(), "PDF file is too large (4.0 KB). Maximum size is 1.0 KB.");
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        let compressor = Compressor::new(CompressionConfig { max_dimension: 64, ..config() });
        let err = compressor.process_blocking(noisy_png(80, 40)).unwrap_err();

        assert_eq!(err, CompressionError::Dimensions { width: 80, height: 40, max: 64 });
    }

    #[test]
    fn small_images_are_untouched() {
        let file = noisy_png(8, 8);
        let compressor = Compressor::new(CompressionConfig {
            compress_above_bytes: file.len() as u64,
            ..CompressionConfig::default()
        });

        let result = compressor.process_blocking(file.clone()).unwrap();
        assert_eq!(result.file, file);
    }

    /// Validates the re-encode step.
    ///
    /// Assertions:
    /// - The output is a JPEG named after the input.
    /// - Sizes and ratio are reported.
    #[test]
    fn large_images_are_reencoded_as_jpeg() {
        let file = noisy_png(200, 120);
        let original = file.len() as u64;

        let result = Compressor::new(config()).process_blocking(file).unwrap();

        assert_eq!(result.file.mime_type, MIME_JPEG);
        assert_eq!(result.file.file_name, "scan.jpg");
        assert_eq!(result.original_size, original);
        assert_eq!(result.compressed_size, result.file.len() as u64);
        let decoded = image::load_from_memory(&result.file.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 120));
    }

    #[test]
    fn still_large_images_are_resized() {
        let compressor = Compressor::new(CompressionConfig {
            resize_above_bytes: 1,
            resize_dimension: 50,
            ..config()
        });

        let result = compressor.process_blocking(noisy_png(200, 100)).unwrap();

        let decoded = image::load_from_memory(&result.file.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 25));
    }

    #[test]
    fn images_too_large_after_resize_are_rejected() {
        let compressor = Compressor::new(CompressionConfig {
            resize_above_bytes: 1,
            resize_dimension: 50,
            max_file_bytes: 10,
            ..config()
        });

        let err = compressor.process_blocking(noisy_png(200, 100)).unwrap_err();

        assert!(matches!(err, CompressionError::StillTooLarge { .. }));
        let domain: DomainError = err.into();
        assert_eq!(domain.kind, ErrorKind::Validation);
        assert!(!domain.is_transient());
    }

    #[tokio::test]
    async fn process_runs_off_the_async_runtime() {
        let result = Compressor::new(config()).process(noisy_png(64, 64)).await.unwrap();
        assert_eq!(result.file.mime_type, MIME_JPEG);
    }

    #[test]
    fn file_sizes_format_like_the_upload_screen() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
    }
}
