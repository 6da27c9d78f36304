use std::path::Path;

use avatar_core::{
    AvatarError, AvatarResult, AvatarSize, DeleteOutcome, GeneratedAvatar, StoredUpload,
    UploadFiles, UploadOutcome, UserId,
};

use crate::cache::AvatarUrlCache;
use crate::resolver::or_default;
use crate::service::AvatarService;

/// Per-request view of the service.
///
/// Remembers the most recent upload, which `generate` without an explicit
/// path consumes, and caches resolved URLs for the lifetime of the request.
pub struct AvatarSession<'a> {
    service: &'a AvatarService,
    last_upload: Option<StoredUpload>,
    urls: AvatarUrlCache,
}

impl<'a> AvatarSession<'a> {
    pub fn new(service: &'a AvatarService) -> Self {
        Self {
            service,
            last_upload: None,
            urls: AvatarUrlCache::new(),
        }
    }

    pub fn last_upload(&self) -> Option<&StoredUpload> {
        self.last_upload.as_ref()
    }

    pub fn cache(&self) -> &AvatarUrlCache {
        &self.urls
    }

    pub async fn upload(&mut self, files: &UploadFiles, user: UserId) -> UploadOutcome {
        let outcome = self.service.upload(files, user).await;
        if let UploadOutcome::Stored(stored) = &outcome {
            self.last_upload = Some(stored.clone());
        }
        outcome
    }

    /// Generate from `file_path` when it exists, else from the most recent upload.
    ///
    /// A consumed upload is removed from staging whether or not generation succeeds.
    pub async fn generate(
        &mut self,
        user: UserId,
        file_path: Option<&Path>,
    ) -> AvatarResult<GeneratedAvatar> {
        if let Some(path) = file_path {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                let result = self.service.generate(user, path).await;
                self.urls.invalidate_user(user);
                return result;
            }
            tracing::debug!(path = %path.display(), "Explicit avatar source missing, falling back to last upload");
        }

        let stored = self.last_upload.take().ok_or(AvatarError::NoSourceFile)?;
        let result = self.service.generate(user, &stored.path).await;
        self.urls.invalidate_user(user);

        if result.is_err() {
            self.service.store().remove_file(&stored.path).await;
        }

        result
    }

    pub async fn delete(&mut self, user: UserId) -> DeleteOutcome {
        let outcome = self.service.delete(user).await;
        self.urls.invalidate_user(user);
        outcome
    }

    /// URL of the user's avatar at `size`, or `""` when there is none.
    ///
    /// Scan errors are logged and not cached.
    pub async fn avatar(&mut self, user: UserId, size: impl Into<AvatarSize>) -> String {
        let resolver = self.service.resolver();
        let variant = resolver.variant_for(size.into());

        if let Some(url) = self.urls.get(user, variant) {
            return url.to_string();
        }

        match resolver.lookup(user, variant).await {
            Ok(url) => {
                self.urls.insert(user, variant, url.clone());
                url
            }
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to scan avatar folder");
                String::new()
            }
        }
    }

    pub async fn resolve_or_default(
        &mut self,
        user: UserId,
        size: impl Into<AvatarSize>,
        default_url: &str,
        force_default: bool,
    ) -> String {
        if force_default {
            return default_url.to_string();
        }

        or_default(self.avatar(user, size).await, default_url)
    }
}
