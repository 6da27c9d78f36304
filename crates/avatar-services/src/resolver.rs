use avatar_core::{AvatarSize, SizeVariant, UserId};
use avatar_storage::{LocalAvatarStore, StorageResult};

/// Read side of the store: `(user, size)` to a public URL.
///
/// Every lookup scans the user's folder; caching is left to the per-request
/// `AvatarSession`. No lock is taken against writers: while another request
/// deletes or regenerates the same user, a lookup may see zero, one or two
/// files and returns either `""` or the URL of a file that existed at scan time.
#[derive(Clone)]
pub struct AvatarResolver {
    store: LocalAvatarStore,
    thumb_size: u32,
}

impl AvatarResolver {
    pub fn new(store: LocalAvatarStore, thumb_size: u32) -> Self {
        Self { store, thumb_size }
    }

    pub fn variant_for(&self, size: AvatarSize) -> SizeVariant {
        size.variant(self.thumb_size)
    }

    /// Scan the user's folder for `variant`. `""` when there is no such file.
    pub async fn lookup(&self, user: UserId, variant: SizeVariant) -> StorageResult<String> {
        Ok(match self.store.find_variant(user, variant).await? {
            Some(filename) => self.store.file_url(user, &filename),
            None => String::new(),
        })
    }

    /// URL of the user's avatar at `size`, or `""` when there is none.
    pub async fn avatar(&self, user: UserId, size: AvatarSize) -> String {
        match self.lookup(user, self.variant_for(size)).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(user_id = %user, error = %e, "Failed to scan avatar folder");
                String::new()
            }
        }
    }

    /// The custom avatar URL, or `default_url` when forced or when the user has none.
    pub async fn resolve_or_default(
        &self,
        user: UserId,
        size: AvatarSize,
        default_url: &str,
        force_default: bool,
    ) -> String {
        if force_default {
            return default_url.to_string();
        }

        or_default(self.avatar(user, size).await, default_url)
    }
}

pub(crate) fn or_default(url: String, default_url: &str) -> String {
    if url.is_empty() {
        default_url.to_string()
    } else {
        url
    }
}
