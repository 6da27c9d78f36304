use image::imageops::FilterType;
use image::DynamicImage;

/// Downscaling of square images to a variant size
pub struct ImageResize;

impl ImageResize {
    /// Resize a square image to `target` x `target`.
    ///
    /// Never upscales: a target at or above the current side returns the image unchanged.
    pub fn to_square(img: &DynamicImage, target: u32) -> DynamicImage {
        let side = img.width().max(img.height());
        if target == 0 || target >= side {
            return img.clone();
        }

        img.resize_exact(target, target, FilterType::Lanczos3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    fn square(side: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(side, side, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn test_downscale() {
        assert_eq!(ImageResize::to_square(&square(300), 150).dimensions(), (150, 150));
        assert_eq!(ImageResize::to_square(&square(300), 50).dimensions(), (50, 50));
    }

    #[test]
    fn test_no_upscale() {
        assert_eq!(ImageResize::to_square(&square(40), 150).dimensions(), (40, 40));
        assert_eq!(ImageResize::to_square(&square(150), 150).dimensions(), (150, 150));
    }
}
