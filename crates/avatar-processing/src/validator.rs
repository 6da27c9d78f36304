use avatar_core::{AllowedTypesPolicy, AvatarConfig, ImageType, UploadDescriptor, UploadErrorCode};
use image::ImageFormat;
use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use crate::image::ImageProcessor;

/// Bytes read from the head of an upload for format sniffing
const SNIFF_LEN: usize = 64;

/// Reasons an upload is refused
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    EmptyFile,

    #[error("Unreadable upload: {0}")]
    Unreadable(String),

    #[error("Unrecognized file contents")]
    UnrecognizedContent,

    #[error("File type not allowed: {0}")]
    TypeNotAllowed(String),

    #[error("Missing file extension: {0}")]
    MissingExtension(String),

    #[error("Extension {extension} does not match detected type {detected}")]
    ExtensionMismatch {
        extension: String,
        detected: ImageType,
    },
}

impl ValidationError {
    pub fn code(&self) -> UploadErrorCode {
        match self {
            ValidationError::FileTooLarge { .. } => UploadErrorCode::ExceedsAvatarLimit,
            ValidationError::EmptyFile | ValidationError::Unreadable(_) => UploadErrorCode::NoFile,
            ValidationError::UnrecognizedContent
            | ValidationError::TypeNotAllowed(_)
            | ValidationError::MissingExtension(_)
            | ValidationError::ExtensionMismatch { .. } => UploadErrorCode::InvalidType,
        }
    }
}

/// Upload validator
///
/// Enforces the avatar size limit and the allowed type list. The type is
/// sniffed from the file contents; the declared extension must agree with it
/// and the declared mime type is never trusted. Performs no writes.
#[derive(Clone)]
pub struct UploadValidator {
    max_size_bytes: u64,
    allowed: Arc<dyn AllowedTypesPolicy>,
}

impl UploadValidator {
    pub fn new(max_size_bytes: u64, allowed: Arc<dyn AllowedTypesPolicy>) -> Self {
        Self {
            max_size_bytes,
            allowed,
        }
    }

    pub fn from_config(config: &AvatarConfig) -> Self {
        Self::new(
            config.max_avatar_size_bytes,
            Arc::new(config.allowed_types.clone()),
        )
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn allowed_types(&self) -> &dyn AllowedTypesPolicy {
        self.allowed.as_ref()
    }

    /// Annotate the descriptor with the outcome of validation.
    ///
    /// A descriptor that already carries an error is returned unchanged.
    pub fn validate(&self, descriptor: UploadDescriptor) -> UploadDescriptor {
        if !descriptor.error.is_ok() {
            return descriptor;
        }

        match self.check(&descriptor) {
            Ok(_) => descriptor.with_error(UploadErrorCode::Ok),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    declared_name = %descriptor.declared_name,
                    declared_size = descriptor.declared_size,
                    "Upload rejected"
                );
                let code = e.code();
                descriptor.with_error(code)
            }
        }
    }

    /// Validate and return the detected image type.
    pub fn check(&self, descriptor: &UploadDescriptor) -> Result<ImageType, ValidationError> {
        if descriptor.declared_size > self.max_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size: descriptor.declared_size,
                max: self.max_size_bytes,
            });
        }

        let head = read_head(descriptor)?;
        let detected = sniff_image_type(&head)?;

        if !self.allowed.allows(detected) {
            return Err(ValidationError::TypeNotAllowed(detected.label().to_string()));
        }

        let extension = descriptor
            .declared_extension()
            .ok_or_else(|| ValidationError::MissingExtension(descriptor.declared_name.clone()))?;

        if ImageType::from_extension(&extension) != Some(detected) {
            return Err(ValidationError::ExtensionMismatch {
                extension,
                detected,
            });
        }

        if let Some(mime) = descriptor.declared_mime.as_deref() {
            if ImageType::from_mime_type(mime) != Some(detected) {
                tracing::warn!(
                    declared_mime = %mime,
                    detected = %detected,
                    "Declared mime type does not match file contents"
                );
            }
        }

        Ok(detected)
    }

    /// User-facing message for a validation code, using this validator's limits.
    pub fn message(&self, code: UploadErrorCode) -> String {
        code.message(self.max_size_bytes, self.allowed.as_ref())
    }
}

impl Default for UploadValidator {
    fn default() -> Self {
        Self::from_config(&AvatarConfig::new("uploads", "/uploads"))
    }
}

fn read_head(descriptor: &UploadDescriptor) -> Result<Vec<u8>, ValidationError> {
    let file = File::open(&descriptor.temp_path)
        .map_err(|e| ValidationError::Unreadable(e.to_string()))?;

    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| ValidationError::Unreadable(e.to_string()))?;

    if head.is_empty() {
        return Err(ValidationError::EmptyFile);
    }
    Ok(head)
}

fn sniff_image_type(head: &[u8]) -> Result<ImageType, ValidationError> {
    match ImageProcessor::sniff_format(head) {
        Some(ImageFormat::Jpeg) => Ok(ImageType::Jpeg),
        Some(ImageFormat::Gif) => Ok(ImageType::Gif),
        Some(ImageFormat::Png) => Ok(ImageType::Png),
        Some(other) => Err(ValidationError::TypeNotAllowed(format!("{:?}", other))),
        None => Err(ValidationError::UnrecognizedContent),
    }
}
