use avatar_core::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::DynamicImage;
use std::io::Cursor;

use crate::pipeline::ProcessingError;

/// Encodes rendered variants in the configured output format
#[derive(Debug, Clone, Copy)]
pub struct AvatarEncoder {
    format: OutputFormat,
    quality: u8,
}

impl AvatarEncoder {
    pub fn new(format: OutputFormat, quality: u8) -> Self {
        Self {
            format,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn encode(&self, img: &DynamicImage) -> Result<Vec<u8>, ProcessingError> {
        let estimated_size = img.width() as usize * img.height() as usize * 3;
        let mut buffer = Vec::with_capacity(estimated_size);

        match self.format {
            OutputFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    Cursor::new(&mut buffer),
                    self.png_compression(),
                    FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)
                    .map_err(|e| ProcessingError::Encode(e.to_string()))?;
            }
            OutputFormat::Jpeg => {
                // JPEG carries no alpha channel
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
                rgb.write_with_encoder(encoder)
                    .map_err(|e| ProcessingError::Encode(e.to_string()))?;
            }
        }

        Ok(buffer)
    }

    /// PNG is lossless; quality only trades encode time for size.
    fn png_compression(&self) -> CompressionType {
        if self.quality >= 90 {
            CompressionType::Best
        } else if self.quality >= 50 {
            CompressionType::Default
        } else {
            CompressionType::Fast
        }
    }
}
