use std::path::Path;

use anyhow::Context;
use avatar_core::{UploadDescriptor, UploadFiles};
use avatar_services::UPLOAD_FIELD;

/// Initialize tracing for CLI binaries. Logs go to stderr, results to stdout.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Copy `source` into `temp_dir` and describe the copy as a `file` upload.
///
/// Uploading moves the file into staging, so the caller's file is never handed over directly.
pub fn upload_files_for(source: &Path, temp_dir: &Path) -> anyhow::Result<UploadFiles> {
    let declared_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let copy = temp_dir.join("upload");
    let size = std::fs::copy(source, &copy)
        .with_context(|| format!("Failed to read {}", source.display()))?;

    let mut files = UploadFiles::new();
    files.insert(
        UPLOAD_FIELD.to_string(),
        UploadDescriptor::new(copy, size, declared_name, None),
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_core::UploadErrorCode;
    use tempfile::tempdir;

    #[test]
    fn upload_files_for_copies_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("Portrait.PNG");
        std::fs::write(&source, b"0123456789").unwrap();
        let staging = tempdir().unwrap();

        let files = upload_files_for(&source, staging.path()).unwrap();
        let descriptor = &files[UPLOAD_FIELD];

        assert_eq!(descriptor.declared_name, "Portrait.PNG");
        assert_eq!(descriptor.declared_size, 10);
        assert_eq!(descriptor.error, UploadErrorCode::Ok);
        assert!(descriptor.temp_path.starts_with(staging.path()));
        assert!(source.exists());
    }

    #[test]
    fn upload_files_for_missing_source() {
        let dir = tempdir().unwrap();
        let result = upload_files_for(&dir.path().join("nope.png"), dir.path());
        assert!(result.is_err());
    }
}
