//! Image metadata types

use serde::{Deserialize, Serialize};

/// Geometry and orientation of a decoded source image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Raw EXIF orientation tag, `None` when absent or normal (1).
    pub exif_orientation: Option<u8>,
}

impl ImageMetadata {
    /// Width and height as displayed, after the EXIF orientation is applied.
    pub fn oriented_dimensions(&self) -> (u32, u32) {
        match self.exif_orientation {
            Some(5..=8) => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }
}
