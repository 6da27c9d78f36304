//! Multipart extraction for avatar uploads
//!
//! Transport failures are not returned as errors: they are folded into the
//! descriptor's error code so the service reports them like any other
//! rejected upload.

use std::path::Path;

use avatar_core::{UploadDescriptor, UploadErrorCode, UploadFiles, UserId};
use avatar_services::UPLOAD_FIELD;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;

/// Optional field naming the user whose avatar is being changed.
pub const USER_FIELD: &str = "user";

/// Fields of an avatar upload form.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: UploadFiles,
    pub user: Option<UserId>,
}

/// Read the form, spooling the `file` field into `temp_dir`.
pub async fn read_upload_form(mut multipart: Multipart, temp_dir: &Path) -> UploadForm {
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                let code = transport_error_code(&e);
                tracing::debug!(error = %e, code = code.as_str(), "Failed to read multipart");
                form.files
                    .entry(UPLOAD_FIELD.to_string())
                    .or_insert_with(|| UploadDescriptor::failed(code));
                break;
            }
        };

        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        if field_name == UPLOAD_FIELD {
            if form.files.contains_key(UPLOAD_FIELD) {
                tracing::debug!("Ignoring repeated file field");
                continue;
            }
            let descriptor = spool_file(field, temp_dir).await;
            let failed = !descriptor.error.is_ok();
            form.files.insert(UPLOAD_FIELD.to_string(), descriptor);
            if failed {
                break;
            }
        } else if field_name == USER_FIELD {
            match field.text().await {
                Ok(text) => form.user = text.parse::<UserId>().ok(),
                Err(e) => tracing::debug!(error = %e, "Failed to read user field"),
            }
        }
    }

    form
}

async fn spool_file(mut field: Field<'_>, temp_dir: &Path) -> UploadDescriptor {
    let declared_name = field.file_name().map(|s| s.to_string()).unwrap_or_default();
    let declared_mime = field.content_type().map(|s| s.to_string());
    let path = temp_dir.join("upload");

    let mut file = match tokio::fs::File::create(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to create upload temp file");
            return UploadDescriptor::failed(UploadErrorCode::NoTmpDir);
        }
    };

    let mut size: u64 = 0;
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                size += chunk.len() as u64;
                if let Err(e) = file.write_all(&chunk).await {
                    tracing::error!(path = %path.display(), error = %e, "Failed to write upload");
                    return UploadDescriptor::failed(UploadErrorCode::WriteFailed);
                }
            }
            Ok(None) => break,
            Err(e) => {
                let code = transport_error_code(&e);
                tracing::debug!(error = %e, received = size, code = code.as_str(), "Upload interrupted");
                return UploadDescriptor::failed(code);
            }
        }
    }

    if let Err(e) = file.flush().await {
        tracing::error!(path = %path.display(), error = %e, "Failed to flush upload");
        return UploadDescriptor::failed(UploadErrorCode::WriteFailed);
    }

    if size == 0 && declared_name.is_empty() {
        return UploadDescriptor::failed(UploadErrorCode::NoFile);
    }

    UploadDescriptor::new(path, size, declared_name, declared_mime)
}

fn transport_error_code(error: &MultipartError) -> UploadErrorCode {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadErrorCode::ExceedsSiteLimit
    } else {
        UploadErrorCode::PartialUpload
    }
}
