use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use avatar_core::{
    Actor, AvatarConfig, AvatarError, AvatarResult, AvatarSize, DeleteOutcome, EditOthersPolicy,
    EditorAllowlist, GeneratedAvatar, SizeVariant, StoredUpload, UploadErrorCode, UploadFiles,
    UploadOutcome, UserId,
};
use avatar_processing::{
    AvatarRenderer, ImageRenderer, ProcessingError, RenderPlan, UploadValidator,
};
use avatar_storage::{keys::variant_filename, LocalAvatarStore};

use crate::resolver::AvatarResolver;
use crate::session::AvatarSession;

/// Multipart field an avatar upload arrives in
pub const UPLOAD_FIELD: &str = "file";

/// Generate/delete/resolve contract of the avatar pipeline.
///
/// Built once per process and shared behind an `Arc`. Operations for the same
/// user are not serialized: concurrent writers race and the last one wins.
#[derive(Clone)]
pub struct AvatarService {
    validator: UploadValidator,
    store: LocalAvatarStore,
    renderer: Arc<dyn AvatarRenderer>,
    resolver: AvatarResolver,
    editors: Arc<dyn EditOthersPolicy>,
    plan: RenderPlan,
}

impl AvatarService {
    pub fn new(
        validator: UploadValidator,
        store: LocalAvatarStore,
        renderer: Arc<dyn AvatarRenderer>,
        editors: Arc<dyn EditOthersPolicy>,
        plan: RenderPlan,
    ) -> Self {
        let resolver = AvatarResolver::new(store.clone(), plan.thumb_size);

        Self {
            validator,
            store,
            renderer,
            resolver,
            editors,
            plan,
        }
    }

    pub fn from_config(config: &AvatarConfig) -> AvatarResult<Self> {
        let store = LocalAvatarStore::from_config(config)
            .map_err(|e| AvatarError::InvalidInput(e.to_string()))?;

        tracing::debug!(
            avatars_dir = %config.avatars_dir().display(),
            staging_dir = %config.staging_dir.display(),
            full_size = config.full_size,
            thumb_size = config.thumb_size,
            output_format = ?config.output_format,
            "Avatar service configured"
        );

        Ok(Self::new(
            UploadValidator::from_config(config),
            store,
            Arc::new(ImageRenderer),
            Arc::new(EditorAllowlist::new(config.editor_ids.iter().copied())),
            RenderPlan::from_config(config),
        ))
    }

    /// Swap the image backend.
    pub fn with_renderer(mut self, renderer: Arc<dyn AvatarRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Swap the policy deciding who may edit other users' avatars.
    pub fn with_editor_policy(mut self, editors: Arc<dyn EditOthersPolicy>) -> Self {
        self.editors = editors;
        self
    }

    /// Start a per-request session that remembers the most recent upload and
    /// caches resolved URLs.
    pub fn session(&self) -> AvatarSession<'_> {
        AvatarSession::new(self)
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    pub fn store(&self) -> &LocalAvatarStore {
        &self.store
    }

    pub fn resolver(&self) -> &AvatarResolver {
        &self.resolver
    }

    /// Validate the `file` entry of `files` and move it into staging.
    ///
    /// Rejections are returned as data. Nothing is written for a rejected upload.
    pub async fn upload(&self, files: &UploadFiles, user: UserId) -> UploadOutcome {
        let Some(descriptor) = files.get(UPLOAD_FIELD) else {
            return self.reject(user, UploadErrorCode::NoFile);
        };

        if !descriptor.error.is_ok() {
            return self.reject(user, descriptor.error);
        }

        let validator = self.validator.clone();
        let candidate = descriptor.clone();
        let checked = tokio::task::spawn_blocking(move || validator.check(&candidate)).await;

        let image_type = match checked {
            Ok(Ok(image_type)) => image_type,
            Ok(Err(e)) => {
                tracing::debug!(user_id = %user, error = %e, "Avatar upload failed validation");
                return self.reject(user, e.code());
            }
            Err(e) => {
                tracing::error!(user_id = %user, error = %e, "Validation task failed");
                return self.reject(user, UploadErrorCode::NoTmpDir);
            }
        };

        let extension = image_type.extensions()[0];
        let path = match self.store.stage_upload(&descriptor.temp_path, extension).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(user_id = %user, error = %e, "Failed to stage avatar upload");
                return self.reject(user, UploadErrorCode::WriteFailed);
            }
        };

        tracing::info!(
            user_id = %user,
            path = %path.display(),
            size_bytes = descriptor.declared_size,
            image_type = %image_type,
            "Avatar upload accepted"
        );

        UploadOutcome::Stored(StoredUpload {
            path,
            size_bytes: descriptor.declared_size,
            image_type,
            original_name: descriptor.declared_name.clone(),
        })
    }

    fn reject(&self, user: UserId, code: UploadErrorCode) -> UploadOutcome {
        let message = self.validator.message(code);
        tracing::debug!(user_id = %user, code = code.as_str(), message = %message, "Avatar upload rejected");
        UploadOutcome::Rejected { code, message }
    }

    /// Replace the user's avatar with variants rendered from `source`.
    ///
    /// The old avatar is deleted only after the source decoded successfully.
    /// A crash between that delete and the writes leaves the user with no avatar.
    pub async fn generate(&self, user: UserId, source: &Path) -> AvatarResult<GeneratedAvatar> {
        let start = Instant::now();

        let data = tokio::fs::read(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AvatarError::NoSourceFile
            } else {
                AvatarError::Storage(format!("Failed to read {}: {}", source.display(), e))
            }
        })?;

        let renderer = Arc::clone(&self.renderer);
        let decoded = tokio::task::spawn_blocking(move || renderer.inspect(&data))
            .await
            .map_err(|e| AvatarError::Internal(format!("Image inspection task failed: {}", e)))?
            .map_err(|e| {
                tracing::warn!(user_id = %user, path = %source.display(), error = %e, "Unreadable avatar source");
                AvatarError::UnreadableImage(e.to_string())
            })?;

        self.delete(user).await;

        let renderer = Arc::clone(&self.renderer);
        let plan = self.plan;
        let variants = tokio::task::spawn_blocking(move || renderer.render(decoded, &plan))
            .await
            .map_err(|e| AvatarError::Internal(format!("Image render task failed: {}", e)))?
            .map_err(|e| match e {
                ProcessingError::Decode(msg) => AvatarError::UnreadableImage(msg),
                other => AvatarError::ImageProcessing(other.to_string()),
            })?;

        let extension = self.plan.format.extension();
        let token = self.store.new_batch_token(user, extension).await;

        let mut files = Vec::with_capacity(variants.len());
        let mut full = String::new();
        let mut thumb = String::new();

        for variant in &variants {
            let filename = variant_filename(&token, variant.variant, extension);
            match self.store.write_variant(user, &filename, &variant.bytes).await {
                Ok(path) => files.push(path),
                Err(e) => {
                    tracing::error!(user_id = %user, filename = %filename, error = %e, "Failed to write avatar variant, rolling back");
                    for written in &files {
                        self.store.remove_file(written).await;
                    }
                    return Err(AvatarError::Storage(e.to_string()));
                }
            }

            let url = self.store.file_url(user, &filename);
            match variant.variant {
                SizeVariant::Full => full = url,
                SizeVariant::Thumb => thumb = url,
            }
        }

        self.store.remove_file(source).await;

        tracing::info!(
            user_id = %user,
            token = %token,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Avatar generated"
        );

        Ok(GeneratedAvatar {
            user,
            full,
            thumb,
            files,
        })
    }

    /// Delete every variant of the user's avatar. Idempotent, never fails.
    pub async fn delete(&self, user: UserId) -> DeleteOutcome {
        self.store.delete_user(user).await
    }

    /// URL of the user's avatar at `size`, or `""` when there is none.
    ///
    /// Scans the folder on every call; use a session to cache within a request.
    pub async fn avatar(&self, user: UserId, size: impl Into<AvatarSize>) -> String {
        self.resolver.avatar(user, size.into()).await
    }

    pub async fn resolve_or_default(
        &self,
        user: UserId,
        size: impl Into<AvatarSize>,
        default_url: &str,
        force_default: bool,
    ) -> String {
        self.resolver
            .resolve_or_default(user, size.into(), default_url, force_default)
            .await
    }

    pub fn current_user_can_edit_others_avatar(&self, actor: &Actor) -> bool {
        self.editors.can_edit_others_avatar(actor)
    }

    /// Whose avatar a request acts on.
    ///
    /// A request for another user from an actor without the capability is
    /// downgraded to the actor's own avatar rather than refused.
    pub fn target_user(&self, actor: &Actor, requested: Option<UserId>) -> UserId {
        match requested {
            Some(user) if user != actor.id => {
                if self.current_user_can_edit_others_avatar(actor) {
                    user
                } else {
                    tracing::debug!(
                        actor = %actor.id,
                        requested = %user,
                        "Actor may not edit other avatars, using own"
                    );
                    actor.id
                }
            }
            _ => actor.id,
        }
    }

    /// Check that `actor` may act on `requested`, refusing rather than downgrading.
    pub fn authorize_target(&self, actor: &Actor, requested: UserId) -> AvatarResult<UserId> {
        if requested == actor.id || self.current_user_can_edit_others_avatar(actor) {
            return Ok(requested);
        }

        tracing::debug!(actor = %actor.id, requested = %requested, "Actor may not edit other avatars");
        Err(AvatarError::Forbidden(
            "You are not allowed to change another user's avatar.".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avatar_core::{ErrorMetadata, UploadDescriptor, UploadOutcome};
    use avatar_processing::{DecodedAvatar, RenderedVariant};
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
        config: AvatarConfig,
        service: AvatarService,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(|_| {})
        }

        fn with_config(customize: impl FnOnce(&mut AvatarConfig)) -> Self {
            let dir = tempdir().unwrap();
            let mut config =
                AvatarConfig::new(dir.path().join("uploads"), "http://localhost:4000/uploads");
            config.staging_dir = dir.path().join("staging");
            customize(&mut config);
            let service = AvatarService::from_config(&config).unwrap();
            Self {
                dir,
                config,
                service,
            }
        }

        fn staged_files(&self) -> usize {
            std::fs::read_dir(self.dir.path().join("staging"))
                .map(|entries| entries.count())
                .unwrap_or(0)
        }

        /// A PNG that passes the signature check but cannot be decoded.
        fn truncated_png(&self, name: &str) -> PathBuf {
            let mut bytes = std::fs::read(self.source("whole.png", 64, 64, ImageFormat::Png)).unwrap();
            bytes.truncate(40);
            let path = self.dir.path().join(name);
            std::fs::write(&path, bytes).unwrap();
            path
        }

        fn avatar_files(&self, user: u64) -> Vec<String> {
            let folder = self
                .dir
                .path()
                .join("uploads/avatars")
                .join(user.to_string());
            let mut names: Vec<String> = std::fs::read_dir(folder)
                .map(|entries| {
                    entries
                        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                        .collect()
                })
                .unwrap_or_default();
            names.sort();
            names
        }

        /// Write an encoded image into the fixture dir and return its path.
        fn source(&self, name: &str, width: u32, height: u32, format: ImageFormat) -> PathBuf {
            let img = RgbaImage::from_pixel(width, height, Rgba([30, 90, 200, 255]));
            let mut buffer = Vec::new();
            image::DynamicImage::ImageRgba8(img)
                .to_rgb8()
                .write_to(&mut Cursor::new(&mut buffer), format)
                .unwrap();
            let path = self.dir.path().join(name);
            std::fs::write(&path, buffer).unwrap();
            path
        }

        fn files_map(&self, path: &Path, name: &str, mime: &str) -> UploadFiles {
            let size = std::fs::metadata(path).unwrap().len();
            let mut files = HashMap::new();
            files.insert(
                UPLOAD_FIELD.to_string(),
                UploadDescriptor::new(path, size, name, Some(mime.to_string())),
            );
            files
        }
    }

    #[tokio::test]
    async fn test_generate_then_resolve_user_42() {
        let fx = Fixture::new();
        let user = UserId(42);
        let source = fx.source("photo.jpg", 400, 300, ImageFormat::Jpeg);

        let mut session = fx.service.session();
        let files = fx.files_map(&source, "photo.jpg", "image/jpeg");
        let outcome = session.upload(&files, user).await;
        assert!(outcome.stored().is_some());

        let generated = session.generate(user, None).await.unwrap();
        assert!(generated.full.starts_with("http://localhost:4000/uploads/avatars/42/"));
        assert!(generated.full.ends_with("-full.png"));
        assert!(generated.thumb.ends_with("-thumb.png"));

        let full = fx.service.avatar(user, SizeVariant::Full).await;
        assert_eq!(full, generated.full);
        assert_eq!(
            fx.service.avatar(user, 50u32).await,
            fx.service.avatar(user, SizeVariant::Thumb).await
        );
        assert_eq!(fx.service.avatar(user, 96u32).await, full);

        for path in &generated.files {
            assert!(path.exists());
        }
        let full_img = image::open(&generated.files[0]).unwrap();
        assert_eq!((full_img.width(), full_img.height()), (150, 150));

        // consumed source is gone
        assert!(!outcome.stored().unwrap().path.exists());
    }

    #[tokio::test]
    async fn test_regeneration_replaces_previous_avatar() {
        let fx = Fixture::new();
        let user = UserId(7);

        let first = fx
            .service
            .generate(user, &fx.source("a.png", 200, 200, ImageFormat::Png))
            .await
            .unwrap();
        let second = fx
            .service
            .generate(user, &fx.source("b.png", 300, 200, ImageFormat::Png))
            .await
            .unwrap();

        assert_ne!(first.full, second.full);
        let files = fx.avatar_files(7);
        assert_eq!(files.len(), 2);
        assert_eq!(files.iter().filter(|f| f.ends_with("-full.png")).count(), 1);
        assert_eq!(files.iter().filter(|f| f.ends_with("-thumb.png")).count(), 1);
        assert_eq!(fx.service.avatar(user, SizeVariant::Full).await, second.full);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let fx = Fixture::new();
        let user = UserId(5);
        fx.service
            .generate(user, &fx.source("a.png", 64, 64, ImageFormat::Png))
            .await
            .unwrap();
        assert!(!fx.service.avatar(user, SizeVariant::Full).await.is_empty());

        let first = fx.service.delete(user).await;
        assert_eq!(first.removed_count(), 2);
        assert!(first.failures().is_empty());

        let second = fx.service.delete(user).await;
        assert!(matches!(second, DeleteOutcome::FolderMissing));

        assert_eq!(fx.service.avatar(user, SizeVariant::Full).await, "");
        assert_eq!(fx.service.avatar(user, SizeVariant::Thumb).await, "");
    }

    #[tokio::test]
    async fn test_oversize_upload_writes_nothing() {
        let fx = Fixture::with_config(|config| config.max_avatar_size_bytes = 100);
        let source = fx.source("big.png", 300, 300, ImageFormat::Png);
        let files = fx.files_map(&source, "big.png", "image/png");

        let outcome = fx.service.session().upload(&files, UserId(1)).await;
        assert_eq!(outcome.error_code(), UploadErrorCode::ExceedsAvatarLimit);
        match outcome {
            UploadOutcome::Rejected { message, .. } => {
                assert_eq!(
                    message,
                    "That photo is too big. Please upload one smaller than 100 B"
                )
            }
            UploadOutcome::Stored(_) => panic!("oversize upload was stored"),
        }

        assert!(!fx.dir.path().join("staging").exists());
        assert!(fx.avatar_files(1).is_empty());
    }

    #[tokio::test]
    async fn test_bad_type_upload_writes_nothing() {
        let fx = Fixture::new();
        let path = fx.dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text, not an image").unwrap();
        let files = fx.files_map(&path, "notes.png", "image/png");

        let mut session = fx.service.session();
        let outcome = session.upload(&files, UserId(1)).await;
        assert_eq!(outcome.error_code(), UploadErrorCode::InvalidType);
        assert!(session.last_upload().is_none());
        assert!(!fx.dir.path().join("staging").exists());

        let result = session.generate(UserId(1), None).await;
        assert!(matches!(result, Err(AvatarError::NoSourceFile)));
        assert!(fx.avatar_files(1).is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let fx = Fixture::new();
        let outcome = fx.service.upload(&HashMap::new(), UserId(1)).await;
        assert_eq!(outcome.error_code(), UploadErrorCode::NoFile);
    }

    #[tokio::test]
    async fn test_unreadable_image_keeps_existing_avatar() {
        let fx = Fixture::new();
        let user = UserId(9);
        let existing = fx
            .service
            .generate(user, &fx.source("a.png", 64, 64, ImageFormat::Png))
            .await
            .unwrap();

        let broken = fx.dir.path().join("broken.png");
        let mut bytes = std::fs::read(fx.source("b.png", 64, 64, ImageFormat::Png)).unwrap();
        bytes.truncate(20);
        std::fs::write(&broken, bytes).unwrap();

        let result = fx.service.generate(user, &broken).await;
        assert!(matches!(result, Err(AvatarError::UnreadableImage(_))));
        assert_eq!(fx.service.avatar(user, SizeVariant::Full).await, existing.full);
        assert_eq!(fx.avatar_files(9).len(), 2);
    }

    #[tokio::test]
    async fn test_generate_without_source() {
        let fx = Fixture::new();
        let result = fx
            .service
            .generate(UserId(1), &fx.dir.path().join("missing.png"))
            .await;
        assert!(matches!(result, Err(AvatarError::NoSourceFile)));
    }

    #[tokio::test]
    async fn test_jpeg_output_format() {
        let fx = Fixture::with_config(|config| config.output_format = avatar_core::OutputFormat::Jpeg);
        let generated = fx
            .service
            .generate(UserId(2), &fx.source("a.png", 80, 80, ImageFormat::Png))
            .await
            .unwrap();
        assert!(generated.full.ends_with("-full.jpg"));
        assert!(generated.thumb.ends_with("-thumb.jpg"));
    }

    #[tokio::test]
    async fn test_resolve_or_default() {
        let fx = Fixture::new();
        let user = UserId(11);
        let default = "http://example.com/default.png";

        assert_eq!(
            fx.service.resolve_or_default(user, 96u32, default, false).await,
            default
        );

        let generated = fx
            .service
            .generate(user, &fx.source("a.png", 64, 64, ImageFormat::Png))
            .await
            .unwrap();

        assert_eq!(
            fx.service.resolve_or_default(user, 96u32, default, false).await,
            generated.full
        );
        assert_eq!(
            fx.service.resolve_or_default(user, 96u32, default, true).await,
            default
        );
    }

    #[tokio::test]
    async fn test_session_cache_follows_its_own_writes() {
        let fx = Fixture::new();
        let user = UserId(12);
        let mut session = fx.service.session();

        // caches the miss
        assert_eq!(session.avatar(user, SizeVariant::Full).await, "");
        assert_eq!(session.cache().len(), 1);

        let source = fx.source("a.png", 64, 64, ImageFormat::Png);
        let generated = session.generate(user, Some(source.as_path())).await.unwrap();
        assert_eq!(session.avatar(user, SizeVariant::Full).await, generated.full);
        assert_eq!(session.avatar(user, 32u32).await, generated.thumb);

        session.delete(user).await;
        assert_eq!(session.avatar(user, SizeVariant::Full).await, "");
    }

    #[tokio::test]
    async fn test_lookups_see_writes_from_other_service_instances() {
        let fx = Fixture::new();
        let other = AvatarService::from_config(&fx.config).unwrap();
        let user = UserId(13);

        assert_eq!(other.avatar(user, SizeVariant::Full).await, "");

        let generated = fx
            .service
            .generate(user, &fx.source("a.png", 64, 64, ImageFormat::Png))
            .await
            .unwrap();
        assert_eq!(other.avatar(user, SizeVariant::Full).await, generated.full);
        assert_eq!(other.session().avatar(user, SizeVariant::Full).await, generated.full);

        fx.service.delete(user).await;
        assert_eq!(other.avatar(user, SizeVariant::Full).await, "");
        assert_eq!(other.session().avatar(user, SizeVariant::Thumb).await, "");

        let regenerated = other
            .generate(user, &fx.source("b.png", 64, 64, ImageFormat::Png))
            .await
            .unwrap();
        assert_eq!(fx.service.avatar(user, SizeVariant::Full).await, regenerated.full);
    }

    #[tokio::test]
    async fn test_failed_generate_discards_staged_upload() {
        let fx = Fixture::new();
        let user = UserId(14);
        let broken = fx.truncated_png("broken.png");
        let files = fx.files_map(&broken, "broken.png", "image/png");

        let mut session = fx.service.session();
        assert!(session.upload(&files, user).await.stored().is_some());
        assert_eq!(fx.staged_files(), 1);

        let result = session.generate(user, None).await;
        assert!(matches!(result, Err(AvatarError::UnreadableImage(_))));
        assert_eq!(fx.staged_files(), 0);
        assert!(session.last_upload().is_none());
    }

    /// Decodes normally, then fails to encode.
    struct FailingEncoder;

    impl AvatarRenderer for FailingEncoder {
        fn inspect(&self, data: &[u8]) -> Result<DecodedAvatar, ProcessingError> {
            ImageRenderer.inspect(data)
        }

        fn render(
            &self,
            _source: DecodedAvatar,
            _plan: &RenderPlan,
        ) -> Result<Vec<RenderedVariant>, ProcessingError> {
            Err(ProcessingError::Encode("encoder unavailable".to_string()))
        }
    }

    /// Emits the full variant twice, so the second write clashes with the first.
    struct DuplicateVariants;

    impl AvatarRenderer for DuplicateVariants {
        fn inspect(&self, data: &[u8]) -> Result<DecodedAvatar, ProcessingError> {
            ImageRenderer.inspect(data)
        }

        fn render(
            &self,
            source: DecodedAvatar,
            plan: &RenderPlan,
        ) -> Result<Vec<RenderedVariant>, ProcessingError> {
            let full = ImageRenderer
                .render(source, plan)?
                .into_iter()
                .find(|v| v.variant == SizeVariant::Full)
                .ok_or_else(|| ProcessingError::Encode("no full variant".to_string()))?;
            Ok(vec![full.clone(), full])
        }
    }

    #[tokio::test]
    async fn test_encode_failure_maps_to_image_processing() {
        let fx = Fixture::new();
        let user = UserId(15);
        fx.service
            .generate(user, &fx.source("a.png", 64, 64, ImageFormat::Png))
            .await
            .unwrap();

        let service = fx.service.clone().with_renderer(Arc::new(FailingEncoder));
        let source = fx.source("b.png", 64, 64, ImageFormat::Png);
        let files = fx.files_map(&source, "b.png", "image/png");

        let mut session = service.session();
        assert!(!session.avatar(user, SizeVariant::Full).await.is_empty());
        assert!(session.upload(&files, user).await.stored().is_some());

        let result = session.generate(user, None).await;
        let err = result.unwrap_err();
        assert!(matches!(err, AvatarError::ImageProcessing(_)));
        assert_eq!(err.error_code(), "IMAGE_PROCESSING_ERROR");

        // the old avatar went before rendering started
        assert!(fx.avatar_files(15).is_empty());
        assert_eq!(session.avatar(user, SizeVariant::Full).await, "");
        assert_eq!(fx.staged_files(), 0);
    }

    #[tokio::test]
    async fn test_write_failure_rolls_back_written_variants() {
        let fx = Fixture::new();
        let user = UserId(16);
        let service = fx.service.clone().with_renderer(Arc::new(DuplicateVariants));
        let source = fx.source("a.png", 64, 64, ImageFormat::Png);

        let mut session = service.session();
        assert_eq!(session.avatar(user, SizeVariant::Full).await, "");

        let result = session.generate(user, Some(source.as_path())).await;
        assert!(matches!(result, Err(AvatarError::Storage(_))));
        assert!(fx.avatar_files(16).is_empty());
        assert_eq!(session.avatar(user, SizeVariant::Full).await, "");
        // an explicit source belongs to the caller and survives the failure
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_unwritable_user_folder_is_a_storage_error() {
        let fx = Fixture::new();
        let avatars = fx.dir.path().join("uploads/avatars");
        std::fs::create_dir_all(&avatars).unwrap();
        std::fs::write(avatars.join("17"), b"not a folder").unwrap();

        let result = fx
            .service
            .generate(UserId(17), &fx.source("a.png", 64, 64, ImageFormat::Png))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AvatarError::Storage(_)));
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(fx.service.avatar(UserId(17), SizeVariant::Full).await, "");
    }

    #[test]
    fn test_target_user() {
        let fx = Fixture::with_config(|config| config.editor_ids = vec![UserId(1)]);

        let admin = Actor::new(1);
        let member = Actor::new(2);

        assert!(fx.service.current_user_can_edit_others_avatar(&admin));
        assert!(!fx.service.current_user_can_edit_others_avatar(&member));

        assert_eq!(fx.service.target_user(&admin, Some(UserId(5))), UserId(5));
        assert_eq!(fx.service.target_user(&admin, None), UserId(1));
        assert_eq!(fx.service.target_user(&member, Some(UserId(5))), UserId(2));
        assert_eq!(fx.service.target_user(&member, Some(UserId(2))), UserId(2));

        assert_eq!(fx.service.authorize_target(&admin, UserId(5)).unwrap(), UserId(5));
        assert_eq!(fx.service.authorize_target(&member, UserId(2)).unwrap(), UserId(2));
        let refused = fx.service.authorize_target(&member, UserId(5)).unwrap_err();
        assert!(matches!(refused, AvatarError::Forbidden(_)));
        assert_eq!(refused.http_status_code(), 403);
    }

    /// Every even user id may edit others.
    struct EvenIdsEdit;

    impl EditOthersPolicy for EvenIdsEdit {
        fn can_edit_others_avatar(&self, actor: &Actor) -> bool {
            actor.id.0 % 2 == 0
        }
    }

    #[tokio::test]
    async fn test_refused_delete_leaves_both_avatars() {
        let fx = Fixture::new();
        let service = fx.service.clone().with_editor_policy(Arc::new(EvenIdsEdit));
        for user in [UserId(3), UserId(5)] {
            service
                .generate(user, &fx.source(&format!("{}.png", user), 64, 64, ImageFormat::Png))
                .await
                .unwrap();
        }

        assert!(service.current_user_can_edit_others_avatar(&Actor::new(4)));
        assert!(service.authorize_target(&Actor::new(3), UserId(5)).is_err());
        assert_eq!(fx.avatar_files(3).len(), 2);
        assert_eq!(fx.avatar_files(5).len(), 2);

        let target = service.authorize_target(&Actor::new(4), UserId(5)).unwrap();
        service.delete(target).await;
        assert!(fx.avatar_files(5).is_empty());
        assert_eq!(fx.avatar_files(3).len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_and_readers_do_not_panic() {
        let fx = Fixture::new();
        let service = Arc::new(fx.service.clone());
        let user = UserId(77);

        let mut handles = Vec::new();
        for i in 0..4 {
            let service = Arc::clone(&service);
            let source = fx.source(&format!("src{}.png", i), 120, 90, ImageFormat::Png);
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    let _ = service.generate(user, &source).await;
                } else {
                    service.delete(user).await;
                }
            }));
        }

        let mut lookups = Vec::new();
        for _ in 0..8 {
            let service = Arc::clone(&service);
            lookups.push(tokio::spawn(async move {
                service.avatar(user, SizeVariant::Full).await
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
        for lookup in lookups {
            let url = lookup.await.unwrap();
            assert!(
                url.is_empty()
                    || (url.starts_with("http://localhost:4000/uploads/avatars/77/")
                        && url.ends_with("-full.png")),
                "unexpected url {}",
                url
            );
        }

        // Once the writers are done a lookup names a file that exists.
        let files = fx.avatar_files(77);
        let full_files: Vec<&String> = files.iter().filter(|f| f.ends_with("-full.png")).collect();
        let url = service.avatar(user, SizeVariant::Full).await;
        assert_eq!(url.is_empty(), full_files.is_empty(), "url {:?} files {:?}", url, files);
        if !url.is_empty() {
            let name = url.rsplit('/').next().unwrap();
            assert!(files.iter().any(|f| f == name), "{} not in {:?}", name, files);
        }
    }
}
