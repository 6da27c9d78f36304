use std::path::{Path, PathBuf};
use std::sync::Arc;

use avatar_core::{
    AvatarConfig, DeleteOutcome, HousekeepingFailure, HousekeepingOp, SizeVariant, UserId,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::keys::{new_token, parse_variant_filename, variant_filename};
use crate::paths::ConfiguredPaths;
use crate::traits::{StorageError, StoragePathProvider, StorageResult};

/// Per-user avatar folders on the local filesystem.
///
/// The folder listing is the index: nothing is cached here. Concurrent
/// writers for the same user are not coordinated (last writer wins).
#[derive(Clone)]
pub struct LocalAvatarStore {
    paths: Arc<dyn StoragePathProvider>,
    dir_name: String,
    staging_dir: PathBuf,
}

impl LocalAvatarStore {
    /// Create a new LocalAvatarStore
    ///
    /// # Arguments
    /// * `paths` - Uploads base directory and URL
    /// * `dir_name` - Name of the avatars directory under the uploads base (e.g. "avatars")
    /// * `staging_dir` - Where accepted uploads wait until they are generated
    pub fn new(
        paths: Arc<dyn StoragePathProvider>,
        dir_name: impl Into<String>,
        staging_dir: impl Into<PathBuf>,
    ) -> StorageResult<Self> {
        let dir_name = dir_name.into();
        if dir_name.is_empty() || dir_name.contains("..") || dir_name.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "Invalid avatars directory name: {}",
                dir_name
            )));
        }

        Ok(Self {
            paths,
            dir_name,
            staging_dir: staging_dir.into(),
        })
    }

    pub fn from_config(config: &AvatarConfig) -> StorageResult<Self> {
        Self::new(
            Arc::new(ConfiguredPaths::from_config(config)),
            config.avatars_dir_name.clone(),
            config.staging_dir.clone(),
        )
    }

    /// `{uploads_base}/{avatars_dir}/{user_id}`
    pub fn user_dir(&self, user: UserId) -> PathBuf {
        self.paths
            .uploads_base_dir()
            .join(&self.dir_name)
            .join(user.to_string())
    }

    /// Public URL of a file in the user's folder.
    pub fn file_url(&self, user: UserId, filename: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.paths.uploads_base_url(),
            self.dir_name,
            user,
            filename
        )
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// List the filenames in the user's folder. `None` when the folder does not exist.
    pub async fn list_files(&self, user: UserId) -> StorageResult<Option<Vec<String>>> {
        let dir = self.user_dir(user);

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read directory {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        Ok(Some(names))
    }

    /// Filename of the current `variant` file, if any.
    ///
    /// Only canonical names are considered. If a concurrent writer left more
    /// than one match, the lexicographically last name wins.
    pub async fn find_variant(
        &self,
        user: UserId,
        variant: SizeVariant,
    ) -> StorageResult<Option<String>> {
        let Some(mut names) = self.list_files(user).await? else {
            return Ok(None);
        };

        names.sort();
        Ok(names.into_iter().rev().find(|name| {
            parse_variant_filename(name)
                .map(|parsed| parsed.variant == variant && !parsed.legacy)
                .unwrap_or(false)
        }))
    }

    /// Draw a token whose `full` and `thumb` filenames are both unused.
    pub async fn new_batch_token(&self, user: UserId, extension: &str) -> String {
        let dir = self.user_dir(user);
        loop {
            let token = new_token();
            let mut taken = false;
            for variant in SizeVariant::ALL {
                let path = dir.join(variant_filename(&token, variant, extension));
                if fs::try_exists(&path).await.unwrap_or(false) {
                    taken = true;
                    break;
                }
            }
            if !taken {
                return token;
            }
            tracing::debug!(user_id = %user, token = %token, "Avatar token collision, drawing again");
        }
    }

    /// Write one variant file into the user's folder, creating the folder if needed.
    pub async fn write_variant(
        &self,
        user: UserId,
        filename: &str,
        data: &[u8],
    ) -> StorageResult<PathBuf> {
        if filename.contains('/') || filename.contains("..") {
            return Err(StorageError::InvalidKey(filename.to_string()));
        }

        let dir = self.user_dir(user);
        fs::create_dir_all(&dir).await.map_err(|e| {
            StorageError::WriteFailed(format!(
                "Failed to create directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let path = dir.join(filename);
        let start = std::time::Instant::now();

        // Never overwrite: a name clash means another batch owns the file.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
            })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            user_id = %user,
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Avatar variant written"
        );

        Ok(path)
    }

    /// Remove every variant file of the user, then the folder if it is left empty.
    ///
    /// Never fails: problems are collected into the outcome and logged.
    pub async fn delete_user(&self, user: UserId) -> DeleteOutcome {
        let dir = self.user_dir(user);

        let names = match self.list_files(user).await {
            Ok(Some(names)) => names,
            Ok(None) => {
                tracing::debug!(user_id = %user, "No avatar folder to delete");
                return DeleteOutcome::FolderMissing;
            }
            Err(e) => {
                let failure = housekeeping_failure(HousekeepingOp::ReadDir, &dir, e);
                return DeleteOutcome::Deleted {
                    removed: Vec::new(),
                    folder_removed: false,
                    failures: vec![failure],
                };
            }
        };

        let mut removed = Vec::new();
        let mut failures = Vec::new();
        let mut remaining = 0usize;

        for name in names {
            if parse_variant_filename(&name).is_none() {
                remaining += 1;
                continue;
            }

            let path = dir.join(&name);
            match fs::remove_file(&path).await {
                Ok(()) => removed.push(name),
                // Already gone, most likely a concurrent delete.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    remaining += 1;
                    failures.push(housekeeping_failure(HousekeepingOp::RemoveFile, &path, e));
                }
            }
        }

        let mut folder_removed = false;
        if remaining == 0 {
            match fs::remove_dir(&dir).await {
                Ok(()) => folder_removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => folder_removed = true,
                Err(e) => failures.push(housekeeping_failure(HousekeepingOp::RemoveDir, &dir, e)),
            }
        }

        tracing::info!(
            user_id = %user,
            removed = removed.len(),
            folder_removed = folder_removed,
            failures = failures.len(),
            "Avatar deleted"
        );

        DeleteOutcome::Deleted {
            removed,
            folder_removed,
            failures,
        }
    }

    /// Move an accepted upload into the staging directory under a random name.
    ///
    /// The client filename never reaches the filesystem. Falls back to
    /// copy + remove when the rename crosses filesystems.
    pub async fn stage_upload(&self, temp_path: &Path, extension: &str) -> StorageResult<PathBuf> {
        fs::create_dir_all(&self.staging_dir).await.map_err(|e| {
            StorageError::StagingFailed(format!(
                "Failed to create staging directory {}: {}",
                self.staging_dir.display(),
                e
            ))
        })?;

        let target = self
            .staging_dir
            .join(format!("{}.{}", Uuid::new_v4().simple(), extension));

        if let Err(rename_err) = fs::rename(temp_path, &target).await {
            tracing::debug!(
                error = %rename_err,
                from = %temp_path.display(),
                "Rename into staging failed, copying instead"
            );

            fs::copy(temp_path, &target).await.map_err(|e| {
                StorageError::StagingFailed(format!(
                    "Failed to copy {} to {}: {}",
                    temp_path.display(),
                    target.display(),
                    e
                ))
            })?;

            if let Err(e) = fs::remove_file(temp_path).await {
                tracing::warn!(
                    error = %e,
                    path = %temp_path.display(),
                    "Failed to remove temporary upload after copy"
                );
            }
        }

        tracing::debug!(path = %target.display(), "Upload staged");
        Ok(target)
    }

    /// Best-effort removal of a single file, e.g. a consumed upload.
    pub async fn remove_file(&self, path: &Path) -> Option<HousekeepingFailure> {
        match fs::remove_file(path).await {
            Ok(()) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => Some(housekeeping_failure(HousekeepingOp::RemoveFile, path, e)),
        }
    }
}

fn housekeeping_failure(
    operation: HousekeepingOp,
    path: &Path,
    error: impl std::fmt::Display,
) -> HousekeepingFailure {
    tracing::warn!(
        operation = ?operation,
        path = %path.display(),
        error = %error,
        "Avatar housekeeping failed"
    );

    HousekeepingFailure {
        operation,
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(base: &Path) -> LocalAvatarStore {
        LocalAvatarStore::new(
            Arc::new(ConfiguredPaths::new(base, "http://localhost:4000/uploads", false)),
            "avatars",
            base.join("staging"),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_traversal_dir_name() {
        let paths = Arc::new(ConfiguredPaths::new("/tmp", "http://localhost", false));
        let result = LocalAvatarStore::new(paths, "../etc", "/tmp/staging");
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_user_dir_and_url() {
        let store = store(Path::new("/srv/uploads"));
        assert_eq!(
            store.user_dir(UserId(42)),
            PathBuf::from("/srv/uploads/avatars/42")
        );
        assert_eq!(
            store.file_url(UserId(42), "abc-full.png"),
            "http://localhost:4000/uploads/avatars/42/abc-full.png"
        );
    }

    #[tokio::test]
    async fn test_missing_folder_lists_as_none() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.list_files(UserId(1)).await.unwrap().is_none());
        assert!(store
            .find_variant(UserId(1), SizeVariant::Full)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_write_and_find_variant() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let path = store
            .write_variant(UserId(7), "tok-full.png", b"png bytes")
            .await
            .unwrap();
        assert!(path.exists());

        let found = store.find_variant(UserId(7), SizeVariant::Full).await.unwrap();
        assert_eq!(found.as_deref(), Some("tok-full.png"));

        let thumb = store.find_variant(UserId(7), SizeVariant::Thumb).await.unwrap();
        assert!(thumb.is_none());
    }

    #[tokio::test]
    async fn test_write_never_overwrites() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store
            .write_variant(UserId(7), "tok-full.png", b"first")
            .await
            .unwrap();
        let second = store.write_variant(UserId(7), "tok-full.png", b"second").await;

        assert!(matches!(second, Err(StorageError::WriteFailed(_))));
        let kept = std::fs::read(store.user_dir(UserId(7)).join("tok-full.png")).unwrap();
        assert_eq!(kept, b"first");
    }

    #[tokio::test]
    async fn test_write_rejects_path_in_filename() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let result = store.write_variant(UserId(7), "../x-full.png", b"x").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_variants_and_legacy_files() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let user = UserId(3);

        store.write_variant(user, "a-full.png", b"1").await.unwrap();
        store.write_variant(user, "a-thumb.png", b"2").await.unwrap();
        store.write_variant(user, "1453-bpfull.jpg", b"3").await.unwrap();

        let outcome = store.delete_user(user).await;
        assert_eq!(outcome.removed_count(), 3);
        assert!(outcome.failures().is_empty());
        assert!(matches!(
            outcome,
            DeleteOutcome::Deleted {
                folder_removed: true,
                ..
            }
        ));
        assert!(!store.user_dir(user).exists());
    }

    #[tokio::test]
    async fn test_delete_keeps_folder_with_foreign_files() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let user = UserId(3);

        store.write_variant(user, "a-full.png", b"1").await.unwrap();
        store.write_variant(user, "notes.txt", b"keep").await.unwrap();

        let outcome = store.delete_user(user).await;
        assert_eq!(outcome.removed_count(), 1);
        assert!(matches!(
            outcome,
            DeleteOutcome::Deleted {
                folder_removed: false,
                ..
            }
        ));
        assert!(store.user_dir(user).join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.write_variant(UserId(5), "a-full.png", b"1").await.unwrap();
        let first = store.delete_user(UserId(5)).await;
        assert_eq!(first.removed_count(), 1);

        let second = store.delete_user(UserId(5)).await;
        assert!(matches!(second, DeleteOutcome::FolderMissing));
    }

    #[tokio::test]
    async fn test_batch_token_is_unused() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        store.write_variant(UserId(9), "a-full.png", b"1").await.unwrap();
        let token = store.new_batch_token(UserId(9), "png").await;
        assert_ne!(token, "a");
        assert!(!store
            .user_dir(UserId(9))
            .join(variant_filename(&token, SizeVariant::Full, "png"))
            .exists());
    }

    #[tokio::test]
    async fn test_stage_upload_uses_random_name() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());

        let temp = dir.path().join("evil name.php.jpg");
        std::fs::write(&temp, b"data").unwrap();

        let staged = store.stage_upload(&temp, "jpg").await.unwrap();
        assert!(staged.starts_with(store.staging_dir()));
        assert!(!staged.to_string_lossy().contains("evil"));
        assert_eq!(std::fs::read(&staged).unwrap(), b"data");
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_fine() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(store
            .remove_file(&dir.path().join("gone.png"))
            .await
            .is_none());
    }
}
