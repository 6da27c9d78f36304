//! Configuration module
//!
//! Every policy value of the avatar pipeline lives here: storage locations,
//! size limits, the allowed type list, target dimensions and the output
//! encoding. Values come from the environment (with `.env` support) and fall
//! back to documented defaults.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::{OutputFormat, UserId};
use crate::policy::ConfiguredTypes;

const SERVER_PORT: u16 = 4000;
const MAX_AVATAR_SIZE_MB: u64 = 2;
const SITE_UPLOAD_LIMIT_MB: u64 = 8;
const FULL_SIZE: u32 = 150;
const THUMB_SIZE: u32 = 50;
const OUTPUT_QUALITY: u8 = 90;
const AVATARS_DIR_NAME: &str = "avatars";
const ALLOWED_TYPES: &str = "jpeg,gif,png";

#[derive(Clone, Debug)]
pub struct AvatarConfig {
    pub server_port: u16,
    pub environment: String,
    /// Allowed CORS origins; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Root of the uploads directory; avatars live under `{uploads_dir}/{avatars_dir_name}`.
    pub uploads_dir: PathBuf,
    /// Public URL the uploads directory is served from.
    pub uploads_url: String,
    /// Rewrite an `http://` uploads URL to `https://`.
    pub force_https: bool,
    pub avatars_dir_name: String,
    /// Where accepted uploads wait, under random names, until they are generated.
    pub staging_dir: PathBuf,
    pub max_avatar_size_bytes: u64,
    /// Transport-level body cap. Anything above is rejected before validation.
    pub site_upload_limit_bytes: u64,
    pub allowed_types: ConfiguredTypes,
    pub full_size: u32,
    pub thumb_size: u32,
    pub output_format: OutputFormat,
    pub output_quality: u8,
    /// Users allowed to change other users' avatars.
    pub editor_ids: Vec<UserId>,
}

impl AvatarConfig {
    /// Configuration with default policy for the given storage location.
    pub fn new(uploads_dir: impl Into<PathBuf>, uploads_url: impl Into<String>) -> Self {
        let uploads_dir = uploads_dir.into();
        Self {
            server_port: SERVER_PORT,
            environment: "development".to_string(),
            cors_origins: vec!["*".to_string()],
            staging_dir: env::temp_dir().join("avatar-staging"),
            uploads_dir,
            uploads_url: uploads_url.into(),
            force_https: false,
            avatars_dir_name: AVATARS_DIR_NAME.to_string(),
            max_avatar_size_bytes: MAX_AVATAR_SIZE_MB * 1024 * 1024,
            site_upload_limit_bytes: SITE_UPLOAD_LIMIT_MB * 1024 * 1024,
            allowed_types: ConfiguredTypes::default(),
            full_size: FULL_SIZE,
            thumb_size: THUMB_SIZE,
            output_format: OutputFormat::Png,
            output_quality: OUTPUT_QUALITY,
            editor_ids: Vec::new(),
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let uploads_dir = env::var("AVATAR_UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string());
        let uploads_url = env::var("AVATAR_UPLOADS_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}/uploads", SERVER_PORT));

        let mut config = AvatarConfig::new(uploads_dir, uploads_url);
        config.environment = environment;

        config.server_port = env_parse("PORT", SERVER_PORT)?;

        config.cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        config.force_https = env::var("AVATAR_FORCE_HTTPS")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            .parse()
            .unwrap_or(false);

        if let Ok(name) = env::var("AVATAR_DIR_NAME") {
            config.avatars_dir_name = name.trim().to_string();
        }

        if let Ok(dir) = env::var("AVATAR_STAGING_DIR") {
            config.staging_dir = PathBuf::from(dir);
        }

        config.max_avatar_size_bytes = megabytes(
            "AVATAR_MAX_FILE_SIZE_MB",
            env_parse("AVATAR_MAX_FILE_SIZE_MB", MAX_AVATAR_SIZE_MB)?,
        )?;
        config.site_upload_limit_bytes = megabytes(
            "SITE_UPLOAD_LIMIT_MB",
            env_parse("SITE_UPLOAD_LIMIT_MB", SITE_UPLOAD_LIMIT_MB)?,
        )?;

        config.allowed_types = ConfiguredTypes::parse(
            &env::var("AVATAR_ALLOWED_TYPES").unwrap_or_else(|_| ALLOWED_TYPES.to_string()),
        );

        config.full_size = env_parse("AVATAR_FULL_SIZE", FULL_SIZE)?;
        config.thumb_size = env_parse("AVATAR_THUMB_SIZE", THUMB_SIZE)?;

        config.output_format = env::var("AVATAR_OUTPUT_FORMAT")
            .unwrap_or_else(|_| "png".to_string())
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        config.output_quality = env_parse("AVATAR_OUTPUT_QUALITY", OUTPUT_QUALITY)?;

        config.editor_ids = parse_user_ids(&env::var("AVATAR_EDITOR_IDS").unwrap_or_default());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.full_size == 0 || self.thumb_size == 0 {
            return Err(anyhow::anyhow!("Avatar sizes must be greater than zero"));
        }
        if self.thumb_size >= self.full_size {
            return Err(anyhow::anyhow!(
                "AVATAR_THUMB_SIZE ({}) must be smaller than AVATAR_FULL_SIZE ({})",
                self.thumb_size,
                self.full_size
            ));
        }
        if !(1..=100).contains(&self.output_quality) {
            return Err(anyhow::anyhow!(
                "AVATAR_OUTPUT_QUALITY must be between 1 and 100"
            ));
        }
        if self.max_avatar_size_bytes == 0 {
            return Err(anyhow::anyhow!("AVATAR_MAX_FILE_SIZE_MB must be greater than zero"));
        }
        if self.max_avatar_size_bytes > self.site_upload_limit_bytes {
            return Err(anyhow::anyhow!(
                "AVATAR_MAX_FILE_SIZE_MB cannot exceed SITE_UPLOAD_LIMIT_MB"
            ));
        }
        let name = self.avatars_dir_name.as_str();
        if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
            return Err(anyhow::anyhow!(
                "AVATAR_DIR_NAME must be a single directory name"
            ));
        }
        if self.uploads_url.trim().is_empty() {
            return Err(anyhow::anyhow!("AVATAR_UPLOADS_URL must not be empty"));
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Directory holding every user's avatar folder.
    pub fn avatars_dir(&self) -> PathBuf {
        self.uploads_dir.join(&self.avatars_dir_name)
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    parse_value(key, env::var(key).ok(), default)
}

fn parse_value<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, anyhow::Error> {
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got {:?}", key, value)),
        _ => Ok(default),
    }
}

fn megabytes(key: &str, mb: u64) -> Result<u64, anyhow::Error> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| anyhow::anyhow!("{} is too large: {} MB", key, mb))
}

/// Parse a comma separated list of user ids, skipping anything that is not a number.
pub fn parse_user_ids(list: &str) -> Vec<UserId> {
    list.split(',')
        .filter_map(|s| s.trim().parse::<UserId>().ok())
        .collect()
}
