//! Upload descriptors and upload error codes
//!
//! Validation outcomes are data: a descriptor carries its own error code from
//! the transport through the validator to the caller.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::policy::{AllowedTypesPolicy, ImageType};

/// Upload error codes, numbered after the classic upload error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadErrorCode {
    Ok,
    ExceedsSiteLimit,
    PartialUpload,
    NoFile,
    NoTmpDir,
    WriteFailed,
    ExtensionBlocked,
    ExceedsAvatarLimit,
    InvalidType,
    NotAuthenticated,
}

impl UploadErrorCode {
    pub fn code(self) -> u8 {
        match self {
            UploadErrorCode::Ok => 0,
            UploadErrorCode::ExceedsSiteLimit => 1,
            UploadErrorCode::PartialUpload => 3,
            UploadErrorCode::NoFile => 4,
            UploadErrorCode::NoTmpDir => 6,
            UploadErrorCode::WriteFailed => 7,
            UploadErrorCode::ExtensionBlocked => 8,
            UploadErrorCode::ExceedsAvatarLimit => 9,
            UploadErrorCode::InvalidType => 10,
            UploadErrorCode::NotAuthenticated => 11,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadErrorCode::Ok => "OK",
            UploadErrorCode::ExceedsSiteLimit => "EXCEEDS_SITE_LIMIT",
            UploadErrorCode::PartialUpload => "PARTIAL_UPLOAD",
            UploadErrorCode::NoFile => "NO_FILE",
            UploadErrorCode::NoTmpDir => "NO_TMP_DIR",
            UploadErrorCode::WriteFailed => "WRITE_FAILED",
            UploadErrorCode::ExtensionBlocked => "EXTENSION_BLOCKED",
            UploadErrorCode::ExceedsAvatarLimit => "EXCEEDS_AVATAR_LIMIT",
            UploadErrorCode::InvalidType => "INVALID_TYPE",
            UploadErrorCode::NotAuthenticated => "NOT_AUTHENTICATED",
        }
    }

    pub fn is_ok(self) -> bool {
        self == UploadErrorCode::Ok
    }

    /// User-facing message for this code.
    ///
    /// `max_size_bytes` feeds the size messages, `allowed` the type message.
    pub fn message(self, max_size_bytes: u64, allowed: &dyn AllowedTypesPolicy) -> String {
        match self {
            UploadErrorCode::Ok => "The file was uploaded successfully".to_string(),
            UploadErrorCode::ExceedsSiteLimit => {
                "The uploaded file exceeds the maximum allowed file size for this site".to_string()
            }
            UploadErrorCode::PartialUpload => {
                "The uploaded file was only partially uploaded.".to_string()
            }
            UploadErrorCode::NoFile => "No file was uploaded.".to_string(),
            UploadErrorCode::NoTmpDir => "Missing a temporary folder.".to_string(),
            UploadErrorCode::WriteFailed => "Failed to write file to disk.".to_string(),
            UploadErrorCode::ExtensionBlocked => "File upload stopped by extension.".to_string(),
            UploadErrorCode::ExceedsAvatarLimit => format!(
                "That photo is too big. Please upload one smaller than {}",
                format_size(max_size_bytes)
            ),
            UploadErrorCode::InvalidType => {
                let types = allowed.allowed_types();
                if types.len() == 1 {
                    format!("Please upload only this file type: {}.", allowed.describe())
                } else {
                    format!("Please upload only these file types: {}.", allowed.describe())
                }
            }
            UploadErrorCode::NotAuthenticated => {
                "You must be logged in to change an avatar.".to_string()
            }
        }
    }
}

/// Human readable byte size using binary units (`2 MB`, `512 KB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if value.fract() == 0.0 {
        format!("{} {}", value as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// A file handed over by the transport layer, before it is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub temp_path: PathBuf,
    pub declared_size: u64,
    pub declared_name: String,
    pub declared_mime: Option<String>,
    pub error: UploadErrorCode,
}

impl UploadDescriptor {
    pub fn new(
        temp_path: impl Into<PathBuf>,
        declared_size: u64,
        declared_name: impl Into<String>,
        declared_mime: Option<String>,
    ) -> Self {
        Self {
            temp_path: temp_path.into(),
            declared_size,
            declared_name: declared_name.into(),
            declared_mime,
            error: UploadErrorCode::Ok,
        }
    }

    /// Descriptor for an upload the transport already failed to receive.
    pub fn failed(error: UploadErrorCode) -> Self {
        Self {
            temp_path: PathBuf::new(),
            declared_size: 0,
            declared_name: String::new(),
            declared_mime: None,
            error,
        }
    }

    pub fn with_error(mut self, error: UploadErrorCode) -> Self {
        self.error = error;
        self
    }

    /// Lower-cased extension of the client-provided filename.
    pub fn declared_extension(&self) -> Option<String> {
        std::path::Path::new(&self.declared_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Upload field name -> descriptor, as extracted from a multipart request.
pub type UploadFiles = HashMap<String, UploadDescriptor>;

/// An accepted upload moved into the staging directory under a random name.
#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub image_type: ImageType,
    pub original_name: String,
}

/// Result of `upload`: rejections are values, not errors.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Stored(StoredUpload),
    Rejected {
        code: UploadErrorCode,
        message: String,
    },
}

impl UploadOutcome {
    pub fn stored(&self) -> Option<&StoredUpload> {
        match self {
            UploadOutcome::Stored(stored) => Some(stored),
            UploadOutcome::Rejected { .. } => None,
        }
    }

    pub fn error_code(&self) -> UploadErrorCode {
        match self {
            UploadOutcome::Stored(_) => UploadErrorCode::Ok,
            UploadOutcome::Rejected { code, .. } => *code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ConfiguredTypes;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(UploadErrorCode::Ok.code(), 0);
        assert_eq!(UploadErrorCode::ExceedsAvatarLimit.code(), 9);
        assert_eq!(UploadErrorCode::InvalidType.code(), 10);
        assert_eq!(UploadErrorCode::InvalidType.as_str(), "INVALID_TYPE");
    }

    #[test]
    fn test_error_code_serializes_screaming_snake() {
        let json = serde_json::to_string(&UploadErrorCode::ExceedsSiteLimit).unwrap();
        assert_eq!(json, "\"EXCEEDS_SITE_LIMIT\"");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_size(1536), "1.5 KB");
    }

    #[test]
    fn test_size_message_includes_limit() {
        let policy = ConfiguredTypes::default();
        let message = UploadErrorCode::ExceedsAvatarLimit.message(2 * 1024 * 1024, &policy);
        assert_eq!(
            message,
            "That photo is too big. Please upload one smaller than 2 MB"
        );
    }

    #[test]
    fn test_type_message_lists_allowed_types() {
        let policy = ConfiguredTypes::default();
        let message = UploadErrorCode::InvalidType.message(0, &policy);
        assert_eq!(message, "Please upload only these file types: JPEG, GIF, PNG.");

        let policy = ConfiguredTypes::parse("png");
        let message = UploadErrorCode::InvalidType.message(0, &policy);
        assert_eq!(message, "Please upload only this file type: PNG.");
    }

    #[test]
    fn test_declared_extension() {
        let descriptor = UploadDescriptor::new("/tmp/x", 10, "Photo.JPG", None);
        assert_eq!(descriptor.declared_extension().as_deref(), Some("jpg"));

        let descriptor = UploadDescriptor::new("/tmp/x", 10, "noextension", None);
        assert_eq!(descriptor.declared_extension(), None);
    }
}
