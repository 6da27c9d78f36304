//! Avatar domain models
//!
//! Identifiers, size variants and the outcome types returned by the
//! generate/delete contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Host platform user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl UserId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(UserId)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id)
    }
}

/// One of the two fixed output sizes of an avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeVariant {
    Full,
    Thumb,
}

impl SizeVariant {
    pub const ALL: [SizeVariant; 2] = [SizeVariant::Full, SizeVariant::Thumb];

    pub fn as_str(self) -> &'static str {
        match self {
            SizeVariant::Full => "full",
            SizeVariant::Thumb => "thumb",
        }
    }

    /// Pick the variant that serves a pixel size.
    ///
    /// Anything strictly larger than the thumb's nominal size is served by `full`.
    pub fn for_pixels(pixels: u32, thumb_size: u32) -> Self {
        if pixels > thumb_size {
            SizeVariant::Full
        } else {
            SizeVariant::Thumb
        }
    }
}

impl fmt::Display for SizeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(SizeVariant::Full),
            "thumb" => Ok(SizeVariant::Thumb),
            other => Err(format!("Unknown avatar variant: {}", other)),
        }
    }
}

/// Size requested by a caller: either a named variant or a pixel dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarSize {
    Variant(SizeVariant),
    Pixels(u32),
}

impl AvatarSize {
    pub fn variant(self, thumb_size: u32) -> SizeVariant {
        match self {
            AvatarSize::Variant(variant) => variant,
            AvatarSize::Pixels(px) => SizeVariant::for_pixels(px, thumb_size),
        }
    }
}

impl Default for AvatarSize {
    fn default() -> Self {
        AvatarSize::Variant(SizeVariant::Full)
    }
}

impl From<SizeVariant> for AvatarSize {
    fn from(variant: SizeVariant) -> Self {
        AvatarSize::Variant(variant)
    }
}

impl From<u32> for AvatarSize {
    fn from(px: u32) -> Self {
        AvatarSize::Pixels(px)
    }
}

impl FromStr for AvatarSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(px) = s.trim().parse::<u32>() {
            return Ok(AvatarSize::Pixels(px));
        }
        s.parse::<SizeVariant>().map(AvatarSize::Variant)
    }
}

/// Raster format every variant is re-encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(format!("Unsupported output format: {}", other)),
        }
    }
}

/// Result of a successful `generate` call.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedAvatar {
    pub user: UserId,
    pub full: String,
    pub thumb: String,
    #[serde(skip)]
    pub files: Vec<PathBuf>,
}

/// Filesystem operation attempted during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HousekeepingOp {
    ReadDir,
    RemoveFile,
    RemoveDir,
}

/// A cleanup step that failed. Never fatal; reported for observability.
#[derive(Debug, Clone, Serialize)]
pub struct HousekeepingFailure {
    pub operation: HousekeepingOp,
    pub path: PathBuf,
    pub message: String,
}

/// Result of deleting a user's avatar.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// The user never had an avatar folder. Nothing to do.
    FolderMissing,
    Deleted {
        removed: Vec<String>,
        folder_removed: bool,
        failures: Vec<HousekeepingFailure>,
    },
}

impl DeleteOutcome {
    pub fn removed_count(&self) -> usize {
        match self {
            DeleteOutcome::FolderMissing => 0,
            DeleteOutcome::Deleted { removed, .. } => removed.len(),
        }
    }

    pub fn failures(&self) -> &[HousekeepingFailure] {
        match self {
            DeleteOutcome::FolderMissing => &[],
            DeleteOutcome::Deleted { failures, .. } => failures,
        }
    }
}
