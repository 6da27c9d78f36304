//! Error types module
//!
//! `AvatarError` is the failure surface of the generate/delete contract.
//! Policy rejections and housekeeping problems are not errors: they travel as
//! `UploadOutcome` and `DeleteOutcome` values. What remains here is what the
//! presentation layer must be able to report.

use std::io;

use crate::upload::UploadErrorCode;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues the user can fix
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UNREADABLE_IMAGE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable by the user (retry or another file)
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    #[error("No source file to generate an avatar from")]
    NoSourceFile,

    #[error("Unreadable image: {0}")]
    UnreadableImage(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upload rejected ({}): {message}", .code.as_str())]
    UploadRejected {
        code: UploadErrorCode,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AvatarResult<T> = Result<T, AvatarError>;

impl From<io::Error> for AvatarError {
    fn from(err: io::Error) -> Self {
        AvatarError::Storage(format!("IO error: {}", err))
    }
}

impl ErrorMetadata for AvatarError {
    fn http_status_code(&self) -> u16 {
        match self {
            AvatarError::NoSourceFile => 400,
            AvatarError::UnreadableImage(_) => 400,
            AvatarError::ImageProcessing(_) => 500,
            AvatarError::Storage(_) => 500,
            AvatarError::UploadRejected { code, .. } => match code {
                UploadErrorCode::ExceedsSiteLimit | UploadErrorCode::ExceedsAvatarLimit => 413,
                UploadErrorCode::NotAuthenticated => 401,
                UploadErrorCode::NoTmpDir | UploadErrorCode::WriteFailed => 500,
                _ => 400,
            },
            AvatarError::InvalidInput(_) => 400,
            AvatarError::Forbidden(_) => 403,
            AvatarError::Internal(_) => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AvatarError::NoSourceFile => "NO_SOURCE_FILE",
            AvatarError::UnreadableImage(_) => "UNREADABLE_IMAGE",
            AvatarError::ImageProcessing(_) => "IMAGE_PROCESSING_ERROR",
            AvatarError::Storage(_) => "STORAGE_ERROR",
            AvatarError::UploadRejected { code, .. } => code.as_str(),
            AvatarError::InvalidInput(_) => "INVALID_INPUT",
            AvatarError::Forbidden(_) => "FORBIDDEN",
            AvatarError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AvatarError::NoSourceFile
                | AvatarError::UnreadableImage(_)
                | AvatarError::UploadRejected { .. }
                | AvatarError::InvalidInput(_)
        )
    }

    fn client_message(&self) -> String {
        match self {
            AvatarError::NoSourceFile => "No file was uploaded.".to_string(),
            AvatarError::UnreadableImage(_) => {
                "The uploaded file is not a readable image. Please pick a different file."
                    .to_string()
            }
            AvatarError::ImageProcessing(_) | AvatarError::Storage(_) => {
                "Something went wrong while generating the avatar.".to_string()
            }
            AvatarError::UploadRejected { message, .. } => {
                format!("Upload Failed! Error was: {}", message)
            }
            AvatarError::InvalidInput(msg) | AvatarError::Forbidden(msg) => msg.clone(),
            AvatarError::Internal(_) => {
                "Invalid request, please refresh the page and try again".to_string()
            }
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AvatarError::UploadRejected { .. }
            | AvatarError::InvalidInput(_)
            | AvatarError::Forbidden(_) => LogLevel::Debug,
            AvatarError::NoSourceFile | AvatarError::UnreadableImage(_) => LogLevel::Warn,
            AvatarError::ImageProcessing(_) | AvatarError::Storage(_) | AvatarError::Internal(_) => {
                LogLevel::Error
            }
        }
    }
}
