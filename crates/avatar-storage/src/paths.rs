use std::path::PathBuf;

use avatar_core::AvatarConfig;

use crate::traits::StoragePathProvider;

/// Path provider backed by configuration values.
#[derive(Debug, Clone)]
pub struct ConfiguredPaths {
    base_dir: PathBuf,
    base_url: String,
}

impl ConfiguredPaths {
    pub fn new(base_dir: impl Into<PathBuf>, base_url: &str, force_https: bool) -> Self {
        let mut base_url = base_url.trim().trim_end_matches('/').to_string();
        if force_https {
            if let Some(rest) = base_url.strip_prefix("http://") {
                base_url = format!("https://{}", rest);
            }
        }

        Self {
            base_dir: base_dir.into(),
            base_url,
        }
    }

    pub fn from_config(config: &AvatarConfig) -> Self {
        Self::new(&config.uploads_dir, &config.uploads_url, config.force_https)
    }
}

impl StoragePathProvider for ConfiguredPaths {
    fn uploads_base_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    fn uploads_base_url(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let paths = ConfiguredPaths::new("/srv/uploads", "http://example.com/uploads/", false);
        assert_eq!(paths.uploads_base_url(), "http://example.com/uploads");
    }

    #[test]
    fn test_force_https_rewrites_scheme() {
        let paths = ConfiguredPaths::new("/srv/uploads", "http://example.com/uploads", true);
        assert_eq!(paths.uploads_base_url(), "https://example.com/uploads");

        let paths = ConfiguredPaths::new("/srv/uploads", "https://example.com/uploads", true);
        assert_eq!(paths.uploads_base_url(), "https://example.com/uploads");
    }
}
