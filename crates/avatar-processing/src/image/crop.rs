use image::DynamicImage;

/// Square region cut from the center of a rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

/// Largest centered square: side `min(w, h)`, origin at the floor of half the slack.
pub fn center_square_region(width: u32, height: u32) -> CropRegion {
    let size = width.min(height);
    CropRegion {
        x: (width - size) / 2,
        y: (height - size) / 2,
        size,
    }
}

/// Crop to the centered square. Square images are returned as is.
pub fn crop_to_square(img: DynamicImage) -> DynamicImage {
    let (width, height) = (img.width(), img.height());
    if width == height {
        return img;
    }

    let region = center_square_region(width, height);
    tracing::debug!(
        width,
        height,
        x = region.x,
        y = region.y,
        size = region.size,
        "Cropping to square"
    );
    img.crop_imm(region.x, region.y, region.size, region.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};

    #[test]
    fn test_center_square_region() {
        assert_eq!(
            center_square_region(400, 300),
            CropRegion { x: 50, y: 0, size: 300 }
        );
        assert_eq!(
            center_square_region(300, 400),
            CropRegion { x: 0, y: 50, size: 300 }
        );
        assert_eq!(
            center_square_region(100, 100),
            CropRegion { x: 0, y: 0, size: 100 }
        );
        // odd slack rounds down
        assert_eq!(
            center_square_region(101, 100),
            CropRegion { x: 0, y: 0, size: 100 }
        );
        assert_eq!(
            center_square_region(103, 100),
            CropRegion { x: 1, y: 0, size: 100 }
        );
    }

    #[test]
    fn test_crop_keeps_center_stripes() {
        // Four 100px vertical stripes; the centered 200px square is stripes B and C.
        let colors = [
            Rgba([255, 0, 0, 255]),
            Rgba([0, 255, 0, 255]),
            Rgba([0, 0, 255, 255]),
            Rgba([255, 255, 0, 255]),
        ];
        let img = RgbaImage::from_fn(400, 200, |x, _| colors[(x / 100) as usize]);

        let cropped = crop_to_square(DynamicImage::ImageRgba8(img));
        assert_eq!(cropped.dimensions(), (200, 200));
        assert_eq!(cropped.get_pixel(0, 100), colors[1]);
        assert_eq!(cropped.get_pixel(99, 100), colors[1]);
        assert_eq!(cropped.get_pixel(100, 100), colors[2]);
        assert_eq!(cropped.get_pixel(199, 100), colors[2]);
    }
}
