//! Allowed image type policy
//!
//! The set of image types accepted for an avatar is injectable. Overrides are
//! intersected with the types this crate knows how to sniff; an empty result
//! falls back to the defaults so a bad override can never open the gate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Image types an avatar upload may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Jpeg,
    Gif,
    Png,
}

impl ImageType {
    pub const DEFAULTS: [ImageType; 3] = [ImageType::Jpeg, ImageType::Gif, ImageType::Png];

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageType::Jpeg => "image/jpeg",
            ImageType::Gif => "image/gif",
            ImageType::Png => "image/png",
        }
    }

    /// File extensions that identify this type. `jpg` is accepted wherever `jpeg` is.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageType::Jpeg => &["jpg", "jpeg", "jpe"],
            ImageType::Gif => &["gif"],
            ImageType::Png => &["png"],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImageType::Jpeg => "JPEG",
            ImageType::Gif => "GIF",
            ImageType::Png => "PNG",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_lowercase();
        Self::DEFAULTS
            .into_iter()
            .find(|t| t.extensions().contains(&extension.as_str()))
    }

    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageType::Jpeg),
            "image/gif" => Some(ImageType::Gif),
            "image/png" => Some(ImageType::Png),
            _ => None,
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ImageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageType::from_extension(s.trim()).ok_or_else(|| format!("Unknown image type: {}", s))
    }
}

/// Source of the image types accepted for avatars.
pub trait AllowedTypesPolicy: Send + Sync {
    fn allowed_types(&self) -> Vec<ImageType>;

    fn allows(&self, image_type: ImageType) -> bool {
        self.allowed_types().contains(&image_type)
    }

    /// Upper-cased labels joined for user-facing messages, e.g. `JPEG, GIF, PNG`.
    fn describe(&self) -> String {
        self.allowed_types()
            .iter()
            .map(|t| t.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Allowlist built from configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredTypes {
    types: Vec<ImageType>,
}

impl ConfiguredTypes {
    /// Keep only the requested types that are also defaults, in default order.
    pub fn new(requested: &[ImageType]) -> Self {
        let types: Vec<ImageType> = ImageType::DEFAULTS
            .into_iter()
            .filter(|t| requested.contains(t))
            .collect();

        if types.is_empty() {
            return Self::default();
        }

        Self { types }
    }

    /// Parse a comma separated list such as `jpeg,png`. Unknown entries are ignored.
    pub fn parse(list: &str) -> Self {
        let requested: Vec<ImageType> = list
            .split(',')
            .filter_map(|s| s.parse::<ImageType>().ok())
            .collect();
        Self::new(&requested)
    }
}

impl Default for ConfiguredTypes {
    fn default() -> Self {
        Self {
            types: ImageType::DEFAULTS.to_vec(),
        }
    }
}

impl AllowedTypesPolicy for ConfiguredTypes {
    fn allowed_types(&self) -> Vec<ImageType> {
        self.types.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist() {
        let policy = ConfiguredTypes::default();
        assert_eq!(
            policy.allowed_types(),
            vec![ImageType::Jpeg, ImageType::Gif, ImageType::Png]
        );
        assert_eq!(policy.describe(), "JPEG, GIF, PNG");
    }

    #[test]
    fn test_override_is_intersected() {
        let policy = ConfiguredTypes::parse("png, webp, svg");
        assert_eq!(policy.allowed_types(), vec![ImageType::Png]);
        assert!(!policy.allows(ImageType::Jpeg));
    }

    #[test]
    fn test_empty_override_falls_back_to_defaults() {
        let policy = ConfiguredTypes::parse("webp,bmp");
        assert_eq!(policy.allowed_types().len(), 3);

        let policy = ConfiguredTypes::new(&[]);
        assert_eq!(policy.allowed_types().len(), 3);
    }

    #[test]
    fn test_jpg_is_an_alias_of_jpeg() {
        assert_eq!(ImageType::from_extension("jpg"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_extension("JPEG"), Some(ImageType::Jpeg));
        assert_eq!(ImageType::from_extension("exe"), None);
    }

    #[test]
    fn test_from_mime_type() {
        assert_eq!(ImageType::from_mime_type("IMAGE/PNG"), Some(ImageType::Png));
        assert_eq!(ImageType::from_mime_type("image/webp"), None);
    }
}
