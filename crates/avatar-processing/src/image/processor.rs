//! Image processor - metadata extraction and EXIF orientation

use crate::metadata::ImageMetadata;
use crate::pipeline::ProcessingError;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use img_parts::{DynImage, ImageEXIF};
use std::io::Cursor;

pub struct ImageProcessor;

impl ImageProcessor {
    /// Decode the image and report its geometry, mime type and EXIF orientation.
    ///
    /// The full decode is deliberate: a file whose header parses but whose body
    /// is truncated must be reported here, before any existing avatar is touched.
    pub fn inspect(data: &[u8]) -> Result<(DynamicImage, ImageMetadata), ProcessingError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        let format = reader
            .format()
            .ok_or_else(|| ProcessingError::Decode("unrecognized image format".to_string()))?;

        let img = reader
            .decode()
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        let (width, height) = img.dimensions();
        if width == 0 || height == 0 {
            return Err(ProcessingError::Decode("image has no pixels".to_string()));
        }

        let orientation = Self::read_exif_orientation(data);

        let metadata = ImageMetadata {
            width,
            height,
            mime_type: format.to_mime_type().to_string(),
            size_bytes: data.len() as u64,
            exif_orientation: if orientation != 1 {
                Some(orientation)
            } else {
                None
            },
        };

        Ok((img, metadata))
    }

    /// Sniff the container format from the leading bytes.
    pub fn sniff_format(head: &[u8]) -> Option<ImageFormat> {
        image::guess_format(head).ok()
    }

    /// Read the EXIF orientation tag (1-8). Returns 1 (normal) when absent or unreadable.
    pub fn read_exif_orientation(data: &[u8]) -> u8 {
        let exif = match Self::locate_exif(data) {
            Some(exif) => exif,
            None => return 1,
        };

        let orientation = exif
            .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .unwrap_or(1);

        match u8::try_from(orientation) {
            Ok(value @ 1..=8) => value,
            _ => {
                tracing::debug!(orientation, "Ignoring out of range EXIF orientation");
                1
            }
        }
    }

    /// Find and parse the EXIF block. img-parts locates the segment for JPEG,
    /// PNG and WebP; anything else goes through the exif container reader.
    fn locate_exif(data: &[u8]) -> Option<exif::Exif> {
        if let Ok(Some(image)) = DynImage::from_bytes(data.to_vec().into()) {
            if let Some(raw) = image.exif() {
                return exif::Reader::new().read_raw(raw.to_vec()).ok();
            }
            return None;
        }

        exif::Reader::new()
            .read_from_container(&mut Cursor::new(data))
            .ok()
    }

    /// Get rotation and flip operations needed for a given EXIF orientation
    /// Returns (rotate_angle, flip_horizontal, flip_vertical), applied in that order.
    pub fn get_orientation_transforms(orientation: u8) -> (Option<u16>, bool, bool) {
        match orientation {
            1 => (None, false, false),      // Normal
            2 => (None, true, false),       // Mirror horizontal
            3 => (Some(180), false, false), // Rotate 180
            4 => (None, false, true),       // Mirror vertical
            5 => (Some(90), true, false),   // Transpose
            6 => (Some(90), false, false),  // Rotate 90 CW
            7 => (Some(270), true, false),  // Transverse
            8 => (Some(270), false, false), // Rotate 270 CW
            _ => (None, false, false),      // Invalid, treat as normal
        }
    }
}
