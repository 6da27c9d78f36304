//! Avatar render pipeline
//!
//! Source bytes in, one encoded buffer per size variant out:
//! 1. Decode
//! 2. EXIF orientation correction
//! 3. Center square crop
//! 4. Downscale to each variant size (never upscale)
//! 5. Encode in the output format

use avatar_core::{AvatarConfig, OutputFormat, SizeVariant};
use image::{DynamicImage, GenericImageView};

use crate::compression::AvatarEncoder;
use crate::image::crop::crop_to_square;
use crate::image::{ImageOrientation, ImageProcessor, ImageResize};
use crate::metadata::ImageMetadata;

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// A source image decoded once by `inspect` and handed on to `render`.
#[derive(Debug, Clone)]
pub struct DecodedAvatar {
    pub image: DynamicImage,
    pub metadata: ImageMetadata,
}

/// Target sizes and encoding of one generation.
#[derive(Debug, Clone, Copy)]
pub struct RenderPlan {
    pub full_size: u32,
    pub thumb_size: u32,
    pub format: OutputFormat,
    pub quality: u8,
}

impl RenderPlan {
    pub fn from_config(config: &AvatarConfig) -> Self {
        Self {
            full_size: config.full_size,
            thumb_size: config.thumb_size,
            format: config.output_format,
            quality: config.output_quality,
        }
    }

    pub fn size_of(&self, variant: SizeVariant) -> u32 {
        match variant {
            SizeVariant::Full => self.full_size,
            SizeVariant::Thumb => self.thumb_size,
        }
    }
}

/// One encoded variant
#[derive(Debug, Clone)]
pub struct RenderedVariant {
    pub variant: SizeVariant,
    pub bytes: Vec<u8>,
    /// Actual pixel dimensions; smaller than `nominal_size` when the source was small.
    pub width: u32,
    pub height: u32,
    pub nominal_size: u32,
}

/// Image decode/transform/encode seam. Implementations are CPU-bound and
/// synchronous; async callers run them on the blocking pool.
pub trait AvatarRenderer: Send + Sync {
    /// Decode the source and read its metadata. Fails on anything undecodable.
    fn inspect(&self, data: &[u8]) -> Result<DecodedAvatar, ProcessingError>;

    /// Produce every variant of `plan` from an inspected source.
    fn render(
        &self,
        source: DecodedAvatar,
        plan: &RenderPlan,
    ) -> Result<Vec<RenderedVariant>, ProcessingError>;
}

/// `AvatarRenderer` backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRenderer;

impl AvatarRenderer for ImageRenderer {
    fn inspect(&self, data: &[u8]) -> Result<DecodedAvatar, ProcessingError> {
        ImageProcessor::inspect(data).map(|(image, metadata)| DecodedAvatar { image, metadata })
    }

    fn render(
        &self,
        source: DecodedAvatar,
        plan: &RenderPlan,
    ) -> Result<Vec<RenderedVariant>, ProcessingError> {
        let start = std::time::Instant::now();
        let DecodedAvatar { image: img, metadata } = source;
        let (oriented_width, oriented_height) = metadata.oriented_dimensions();

        let img = match metadata.exif_orientation {
            Some(orientation) => ImageOrientation::apply_exif_orientation(img, orientation),
            None => img,
        };

        let square = crop_to_square(img);
        let encoder = AvatarEncoder::new(plan.format, plan.quality);

        let mut variants = Vec::with_capacity(SizeVariant::ALL.len());
        for variant in SizeVariant::ALL {
            let nominal_size = plan.size_of(variant);
            let resized = ImageResize::to_square(&square, nominal_size);
            let (width, height) = resized.dimensions();

            variants.push(RenderedVariant {
                variant,
                bytes: encoder.encode(&resized)?,
                width,
                height,
                nominal_size,
            });
        }

        tracing::debug!(
            source_width = oriented_width,
            source_height = oriented_height,
            orientation = ?metadata.exif_orientation,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Avatar variants rendered"
        );

        Ok(variants)
    }
}
